//! [`DiscoverySource`] backed by the mdns-sd daemon, with unicast DNS for
//! domains other than `local`.

use crate::dnssd;
use crate::interfaces::system_interface_name;
use crate::router::{Resolution, Router, Scope};
use crate::unicast::{self, UnicastBrowser};
use async_channel::{Receiver, Sender};
use mdns_sd::{ServiceDaemon, ServiceEvent as MdnsEvent};
use sdbrowse_core::config::MdnsConfig;
use sdbrowse_core::error::DiscoveryError;
use sdbrowse_core::naming::InterfaceNames;
use sdbrowse_core::source::{DiscoverySource, SourceEvent};
use sdbrowse_core::types::{DomainKey, Interface, ServiceKey, ServiceTypeKey};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, error, info, warn};

/// Handle for one subscription.
///
/// Browses are shared between subscriptions of the same query and live as
/// long as the source does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdnsSubscription {
    id: u64,
    query: String,
}

impl MdnsSubscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The DNS-SD name being browsed (`_http._tcp.local.`).
    pub fn query(&self) -> &str {
        &self.query
    }
}

/// mDNS discovery source.
///
/// Owns the daemon and a small runtime whose tasks pump daemon events into
/// a bounded channel. The consumer polls that channel from its own thread
/// with [`MdnsSource::try_next_event`]. Scopes outside `local` are polled
/// over unicast DNS instead.
pub struct MdnsSource {
    /// Runtime hosting the pump tasks
    runtime: Runtime,

    /// mDNS service daemon
    daemon: Arc<ServiceDaemon>,

    /// Unicast DNS client, if the system resolver configuration was usable
    unicast: Option<Arc<UnicastBrowser>>,

    /// Delay between unicast polls
    poll_interval: Duration,

    /// Subscription fan-out and resolution cache
    router: Arc<Router>,

    /// Event channel sender
    event_tx: Sender<SourceEvent>,

    /// Event channel receiver
    event_rx: Receiver<SourceEvent>,

    next_id: AtomicU64,
}

impl MdnsSource {
    /// Starts the mDNS daemon.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Connection`] if the runtime or the daemon
    /// cannot be created (no usable network interface, sockets refused).
    pub fn connect(config: &MdnsConfig) -> Result<Self, DiscoveryError> {
        config
            .validate()
            .map_err(|e| DiscoveryError::Connection(e.to_string()))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .thread_name("sdbrowse-mdns")
            .enable_all()
            .build()
            .map_err(|e| DiscoveryError::Connection(format!("Failed to create runtime: {}", e)))?;

        let daemon = ServiceDaemon::new().map_err(|e| {
            DiscoveryError::Connection(format!("Failed to create mDNS daemon: {}", e))
        })?;

        let unicast = {
            let _guard = runtime.enter();
            match UnicastBrowser::from_system_conf() {
                Ok(browser) => Some(Arc::new(browser)),
                Err(e) => {
                    warn!(error = %e, "No unicast resolver, only local will be browsed");
                    None
                }
            }
        };

        let (event_tx, event_rx) = async_channel::bounded(config.event_channel_capacity);

        info!(
            capacity = config.event_channel_capacity,
            workers = config.worker_threads,
            unicast = unicast.is_some(),
            "mDNS source connected"
        );

        Ok(Self {
            runtime,
            daemon: Arc::new(daemon),
            unicast,
            poll_interval: Duration::from_secs(config.unicast_poll_secs),
            router: Arc::new(Router::new()),
            event_tx,
            event_rx,
            next_id: AtomicU64::new(1),
        })
    }

    /// Next pending event, without blocking.
    pub fn try_next_event(&self) -> Option<SourceEvent> {
        self.event_rx.try_recv().ok()
    }

    fn subscribe(&self, query: String, scope: Scope) -> Result<MdnsSubscription, DiscoveryError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        if !self.router.register(&query, id, scope) {
            debug!(query = %query, id, "Sharing existing browse");
            return Ok(MdnsSubscription { id, query });
        }

        if let Err(reason) = self.start_browse(&query) {
            self.router.unregister(&query, id);
            return Err(DiscoveryError::BrowseFailed {
                browse_type: query,
                reason,
            });
        }

        Ok(MdnsSubscription { id, query })
    }

    fn start_browse(&self, query: &str) -> Result<(), String> {
        if !dnssd::is_multicast_query(query) {
            let browser = self.unicast_browser()?;
            info!(query = %query, interval = ?self.poll_interval, "Starting unicast browse");
            self.runtime.spawn(unicast::poll(
                query.to_string(),
                browser,
                self.router.clone(),
                self.event_tx.clone(),
                self.poll_interval,
            ));
            return Ok(());
        }

        let receiver = self.daemon.browse(query).map_err(|e| e.to_string())?;
        info!(query = %query, "Starting browse");
        self.runtime.spawn(pump(
            query.to_string(),
            receiver,
            self.router.clone(),
            self.event_tx.clone(),
        ));
        Ok(())
    }

    fn unicast_browser(&self) -> Result<Arc<UnicastBrowser>, String> {
        self.unicast
            .clone()
            .ok_or_else(|| "no unicast DNS resolver is configured".to_string())
    }
}

/// Forwards one browse's daemon events until either side goes away.
async fn pump(
    query: String,
    receiver: mdns_sd::Receiver<MdnsEvent>,
    router: Arc<Router>,
    event_tx: Sender<SourceEvent>,
) {
    loop {
        let event = match receiver.recv_async().await {
            Ok(event) => event,
            Err(e) => {
                debug!(query = %query, error = %e, "Browse ended");
                break;
            }
        };

        for event in router.route(&query, event) {
            if event_tx.send(event).await.is_err() {
                debug!(query = %query, "Event channel closed, stopping browse task");
                return;
            }
        }
    }
}

impl InterfaceNames for MdnsSource {
    fn interface_name(&self, interface: Interface) -> Option<String> {
        system_interface_name(interface)
    }
}

impl DiscoverySource for MdnsSource {
    type Subscription = MdnsSubscription;

    fn subscribe_domains(&self, scope: &DomainKey) -> Result<MdnsSubscription, DiscoveryError> {
        let query = dnssd::domain_query(&scope.domain)?;
        self.subscribe(query, Scope::Domains(scope.clone()))
    }

    fn subscribe_service_types(
        &self,
        scope: &DomainKey,
    ) -> Result<MdnsSubscription, DiscoveryError> {
        let query = dnssd::service_type_query(&scope.domain)?;
        self.subscribe(query, Scope::ServiceTypes(scope.clone()))
    }

    fn subscribe_services(
        &self,
        scope: &ServiceTypeKey,
    ) -> Result<MdnsSubscription, DiscoveryError> {
        let query = dnssd::service_query(&scope.service_type, &scope.domain)?;
        self.subscribe(query, Scope::Services(scope.clone()))
    }

    fn resolve_service(&self, key: &ServiceKey) -> Result<(), DiscoveryError> {
        let query = dnssd::service_query(&key.service_type, &key.domain).map_err(|e| {
            DiscoveryError::ResolveRequestFailed {
                service: key.to_string(),
                reason: e.to_string(),
            }
        })?;

        if self.router.listener_count(&query) == 0 {
            return Err(DiscoveryError::ResolveRequestFailed {
                service: key.to_string(),
                reason: format!("'{}' is not being browsed", query),
            });
        }

        match self.router.request_resolution(key) {
            Resolution::Ready(events) => {
                let event_tx = self.event_tx.clone();
                self.runtime.spawn(async move {
                    for event in events {
                        if event_tx.send(event).await.is_err() {
                            warn!("Event channel closed before resolve result was delivered");
                            return;
                        }
                    }
                });
            }
            // mDNS answers arrive through the browse itself
            Resolution::Parked if !dnssd::is_multicast_query(&query) => {
                let browser = self.unicast_browser().map_err(|reason| {
                    DiscoveryError::ResolveRequestFailed {
                        service: key.to_string(),
                        reason,
                    }
                })?;
                self.runtime.spawn(unicast::resolve(
                    key.clone(),
                    browser,
                    self.router.clone(),
                    self.event_tx.clone(),
                ));
            }
            Resolution::Parked | Resolution::AlreadyParked => {}
        }

        Ok(())
    }
}

impl Drop for MdnsSource {
    fn drop(&mut self) {
        self.event_tx.close();
        if let Err(e) = self.daemon.shutdown() {
            error!(error = %e, "Failed to shutdown mDNS daemon");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdbrowse_core::source::BrowseEvent;
    use sdbrowse_core::types::Protocol;

    #[tokio::test]
    async fn test_pump_forwards_routed_events() {
        let query = "_http._tcp.local.".to_string();
        let router = Arc::new(Router::new());
        router.register(
            &query,
            1,
            Scope::Services(ServiceTypeKey::new(
                Interface::UNSPEC,
                Protocol::UNSPEC,
                "_http._tcp",
                "local",
            )),
        );

        let (daemon_tx, daemon_rx) = flume::unbounded();
        let (event_tx, event_rx) = async_channel::bounded(8);

        daemon_tx
            .send(MdnsEvent::SearchStarted(query.clone()))
            .unwrap();
        daemon_tx
            .send(MdnsEvent::ServiceFound(
                query.clone(),
                "Web._http._tcp.local.".to_string(),
            ))
            .unwrap();
        drop(daemon_tx);

        pump(query, daemon_rx, router, event_tx).await;

        match event_rx.recv().await.unwrap() {
            SourceEvent::Browse(BrowseEvent::ServiceNew { key, .. }) => {
                assert_eq!(key.name, "Web");
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(event_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_pump_stops_when_consumer_is_gone() {
        let query = "b._dns-sd._udp.local.".to_string();
        let router = Arc::new(Router::new());
        router.register(&query, 1, Scope::Domains(DomainKey::wildcard("local")));

        let (daemon_tx, daemon_rx) = flume::unbounded();
        let (event_tx, event_rx) = async_channel::bounded(1);
        drop(event_rx);

        daemon_tx
            .send(MdnsEvent::ServiceFound(query.clone(), "example.com.".to_string()))
            .unwrap();

        // Returns even though the daemon side is still open
        pump(query, daemon_rx, router, event_tx).await;
    }

    #[test]
    #[ignore = "needs a multicast-capable network"]
    fn test_connect_and_browse_local() {
        let source = MdnsSource::connect(&MdnsConfig::default()).unwrap();
        let first = source
            .subscribe_service_types(&DomainKey::wildcard("local"))
            .unwrap();
        let second = source
            .subscribe_service_types(&DomainKey::wildcard(""))
            .unwrap();
        assert_eq!(first.query(), second.query());
        assert_ne!(first.id(), second.id());

        assert!(matches!(
            source.subscribe_domains(&DomainKey::wildcard("lab.local")),
            Err(DiscoveryError::UnsupportedScope { .. })
        ));
    }
}
