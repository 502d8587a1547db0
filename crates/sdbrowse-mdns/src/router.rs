//! Routes daemon events to the subscriptions that asked for them.
//!
//! The mDNS daemon keeps a single listener per query name, so every
//! subscription that maps to the same query shares one browse and the router
//! fans its events out. Resolved instances are cached here as well, which is
//! what answers [`sdbrowse_core::DiscoverySource::resolve_service`].
//!
//! Unicast polls feed the same router with synthesized daemon events, so
//! both transports share one routing and caching path.

use crate::dnssd;
use chrono::Utc;
use dashmap::DashMap;
use mdns_sd::{ServiceEvent as MdnsEvent, ServiceInfo};
use sdbrowse_core::error::ResolveError;
use sdbrowse_core::source::{BrowseEvent, SourceEvent};
use sdbrowse_core::types::{
    DomainKey, LookupFlags, Protocol, ResolvedService, ServiceKey, ServiceTypeKey,
};
use std::net::IpAddr;
use tracing::{debug, trace};

/// What a subscription browses for.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Scope {
    Domains(DomainKey),
    ServiceTypes(DomainKey),
    Services(ServiceTypeKey),
}

#[derive(Debug, Clone)]
struct Listener {
    id: u64,
    scope: Scope,
}

/// Outcome of a resolve request.
#[derive(Debug)]
pub(crate) enum Resolution {
    /// Answered from the cache, possibly with other waiters for the same instance
    Ready(Vec<SourceEvent>),
    /// First request for this instance; the caller may start a lookup
    Parked,
    /// The same key is already waiting
    AlreadyParked,
}

/// Host, addresses, port and TXT data of a resolved instance.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedRecord {
    host: String,
    addresses: Vec<IpAddr>,
    port: u16,
    txt: Vec<String>,
}

impl ResolvedRecord {
    pub(crate) fn new(host: &str, mut addresses: Vec<IpAddr>, port: u16, txt: Vec<String>) -> Self {
        addresses.sort();
        addresses.dedup();
        Self {
            host: host.trim_end_matches('.').to_string(),
            addresses,
            port,
            txt,
        }
    }

    fn from_info(info: &ServiceInfo) -> Self {
        let txt = info
            .get_properties()
            .iter()
            .map(|prop| match prop.val() {
                Some(_) => format!("{}={}", prop.key(), prop.val_str()),
                None => prop.key().to_string(),
            })
            .collect();

        Self::new(
            info.get_hostname(),
            info.get_addresses().iter().copied().collect(),
            info.get_port(),
            txt,
        )
    }


    /// Prefers IPv4, like most clients connecting to the result would.
    fn primary_address(&self) -> Option<IpAddr> {
        self.addresses
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| self.addresses.first())
            .copied()
    }

    fn to_resolved(&self, key: ServiceKey) -> Result<ResolvedService, ResolveError> {
        let Some(address) = self.primary_address() else {
            return Err(ResolveError::new(key, "resolved without an address"));
        };

        Ok(ResolvedService {
            key,
            host: self.host.clone(),
            protocol: Protocol::of_address(&address),
            address,
            port: self.port,
            txt: self.txt.clone(),
            resolved_at: Utc::now(),
        })
    }
}

/// Subscription fan-out plus the resolution cache.
#[derive(Default)]
pub(crate) struct Router {
    /// Listeners keyed by query name
    listeners: DashMap<String, Vec<Listener>>,

    /// Resolved instances keyed by lowercase full name
    resolved: DashMap<String, ResolvedRecord>,

    /// Resolve requests waiting for their instance to resolve
    pending: DashMap<String, Vec<ServiceKey>>,
}

impl Router {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a listener; returns true if it is the first for `query`, in
    /// which case the caller must start the browse.
    pub(crate) fn register(&self, query: &str, id: u64, scope: Scope) -> bool {
        let mut listeners = self.listeners.entry(query.to_string()).or_default();
        let first = listeners.is_empty();
        listeners.push(Listener { id, scope });
        first
    }

    /// Drops a listener whose browse could not be started.
    pub(crate) fn unregister(&self, query: &str, id: u64) {
        let now_empty = match self.listeners.get_mut(query) {
            Some(mut listeners) => {
                listeners.retain(|l| l.id != id);
                listeners.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.listeners.remove(query);
        }
    }

    pub(crate) fn listener_count(&self, query: &str) -> usize {
        self.listeners.get(query).map(|l| l.len()).unwrap_or(0)
    }

    /// Answers a resolve request from the cache, or parks it until the
    /// instance resolves.
    ///
    /// The request is parked before the cache is checked a second time. A
    /// record cached in between is then seen here, and one cached later
    /// finds the request in `pending`, so no request is left waiting on a
    /// record that already arrived.
    pub(crate) fn request_resolution(&self, key: &ServiceKey) -> Resolution {
        let cache_key = dnssd::instance_key(&key.name, &key.service_type, &key.domain);

        if let Some(record) = self.resolved.get(&cache_key) {
            return Resolution::Ready(vec![SourceEvent::Resolve(record.to_resolved(key.clone()))]);
        }

        if !self.park(&cache_key, key) {
            debug!(service = %key, "Resolution already requested");
            return Resolution::AlreadyParked;
        }

        debug!(service = %key, "Waiting for service to resolve");
        self.recheck_parked(&cache_key)
    }

    /// Returns false if `key` was already waiting.
    fn park(&self, cache_key: &str, key: &ServiceKey) -> bool {
        let mut waiting = self.pending.entry(cache_key.to_string()).or_default();
        if waiting.contains(key) {
            return false;
        }
        waiting.push(key.clone());
        true
    }

    fn recheck_parked(&self, cache_key: &str) -> Resolution {
        let record = self.resolved.get(cache_key).map(|r| r.value().clone());
        match record {
            Some(record) => Resolution::Ready(self.drain_pending(cache_key, &record)),
            None => Resolution::Parked,
        }
    }

    /// Caches a record and answers every request waiting for it.
    pub(crate) fn complete(&self, cache_key: String, record: ResolvedRecord) -> Vec<SourceEvent> {
        // Cache first, see request_resolution
        self.resolved.insert(cache_key.clone(), record.clone());
        self.drain_pending(&cache_key, &record)
    }

    /// Fails every request waiting for `cache_key`.
    pub(crate) fn fail_pending(&self, cache_key: &str, reason: &str) -> Vec<SourceEvent> {
        self.pending
            .remove(cache_key)
            .map(|(_, keys)| keys)
            .unwrap_or_default()
            .into_iter()
            .map(|key| SourceEvent::Resolve(Err(ResolveError::new(key, reason))))
            .collect()
    }

    fn drain_pending(&self, cache_key: &str, record: &ResolvedRecord) -> Vec<SourceEvent> {
        self.pending
            .remove(cache_key)
            .map(|(_, keys)| keys)
            .unwrap_or_default()
            .into_iter()
            .map(|key| SourceEvent::Resolve(record.to_resolved(key)))
            .collect()
    }

    /// Translates one daemon event from the browse of `query`.
    pub(crate) fn route(&self, query: &str, event: MdnsEvent) -> Vec<SourceEvent> {
        match event {
            MdnsEvent::ServiceFound(_, fullname) => self.found(query, &fullname),

            MdnsEvent::ServiceResolved(info) => self.resolved(&info),

            MdnsEvent::ServiceRemoved(_, fullname) => self.removed(query, &fullname),

            MdnsEvent::SearchStarted(ty) => {
                trace!(query = %ty, "Search started");
                Vec::new()
            }

            MdnsEvent::SearchStopped(ty) => {
                debug!(query = %ty, "Search stopped");
                Vec::new()
            }
        }
    }

    fn scopes(&self, query: &str) -> Vec<Scope> {
        self.listeners
            .get(query)
            .map(|listeners| listeners.iter().map(|l| l.scope.clone()).collect())
            .unwrap_or_default()
    }

    fn found(&self, query: &str, fullname: &str) -> Vec<SourceEvent> {
        let flags = flags_for(query);

        self.scopes(query)
            .into_iter()
            .filter_map(|scope| {
                let event = match scope {
                    Scope::Domains(scope) => {
                        let domain = dnssd::parse_domain(fullname)?;
                        BrowseEvent::DomainNew {
                            key: DomainKey::new(scope.interface, scope.protocol, domain),
                            flags,
                        }
                    }
                    Scope::ServiceTypes(scope) => {
                        let (service_type, domain) = dnssd::parse_service_type(fullname)?;
                        BrowseEvent::ServiceTypeNew {
                            key: ServiceTypeKey::new(
                                scope.interface,
                                scope.protocol,
                                service_type,
                                domain,
                            ),
                            flags,
                        }
                    }
                    Scope::Services(scope) => BrowseEvent::ServiceNew {
                        key: self.instance(&scope, query, fullname)?,
                        flags,
                    },
                };
                Some(SourceEvent::Browse(event))
            })
            .collect()
    }

    fn removed(&self, query: &str, fullname: &str) -> Vec<SourceEvent> {
        let cache_key = dnssd::fullname_key(fullname);
        self.resolved.remove(&cache_key);

        let mut events: Vec<SourceEvent> = self
            .scopes(query)
            .into_iter()
            .filter_map(|scope| match scope {
                Scope::Services(scope) => Some(SourceEvent::Browse(BrowseEvent::ServiceRemove {
                    key: self.instance(&scope, query, fullname)?,
                    flags: flags_for(query),
                })),
                _ => None,
            })
            .collect();

        events.extend(self.fail_pending(&cache_key, "service disappeared while resolving"));
        events
    }

    fn resolved(&self, info: &ServiceInfo) -> Vec<SourceEvent> {
        let cache_key = dnssd::fullname_key(info.get_fullname());
        let record = ResolvedRecord::from_info(info);
        debug!(
            service = info.get_fullname(),
            host = %record.host,
            port = record.port,
            "Service resolved"
        );

        self.complete(cache_key, record)
    }

    fn instance(&self, scope: &ServiceTypeKey, query: &str, fullname: &str) -> Option<ServiceKey> {
        let Some(name) = dnssd::parse_instance(fullname, query) else {
            debug!(fullname, query, "Ignoring instance outside the browsed type");
            return None;
        };

        Some(ServiceKey::new(
            scope.interface,
            scope.protocol,
            name,
            scope.service_type.clone(),
            scope.domain.clone(),
        ))
    }
}

/// Multicast answers come from the mDNS daemon, the rest from unicast DNS.
fn flags_for(query: &str) -> LookupFlags {
    if dnssd::is_multicast_query(query) {
        LookupFlags::MULTICAST
    } else {
        LookupFlags::WIDE_AREA
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdbrowse_core::types::Interface;
    use std::collections::HashMap;

    const TYPES: &str = "_services._dns-sd._udp.local.";
    const HTTP: &str = "_http._tcp.local.";

    fn http_scope() -> Scope {
        Scope::Services(ServiceTypeKey::new(
            Interface::UNSPEC,
            Protocol::UNSPEC,
            "_http._tcp",
            "local",
        ))
    }

    fn web_key() -> ServiceKey {
        ServiceKey::new(Interface::UNSPEC, Protocol::UNSPEC, "Web", "_http._tcp", "local")
    }

    fn web_info() -> ServiceInfo {
        let mut properties = HashMap::new();
        properties.insert("path".to_string(), "/admin".to_string());
        ServiceInfo::new(HTTP, "Web", "web.local.", "192.168.1.20", 8080, properties).unwrap()
    }

    impl Resolution {
        fn ready(self) -> Vec<SourceEvent> {
            match self {
                Resolution::Ready(events) => events,
                other => panic!("expected a cached answer, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_register_reports_first_listener() {
        let router = Router::new();
        let domains = DomainKey::wildcard("");
        assert!(router.register("b._dns-sd._udp.local.", 1, Scope::Domains(domains.clone())));
        assert!(!router.register(
            "b._dns-sd._udp.local.",
            2,
            Scope::Domains(DomainKey::wildcard("local"))
        ));
        assert_eq!(router.listener_count("b._dns-sd._udp.local."), 2);

        router.unregister("b._dns-sd._udp.local.", 2);
        router.unregister("b._dns-sd._udp.local.", 1);
        assert_eq!(router.listener_count("b._dns-sd._udp.local."), 0);
    }

    #[test]
    fn test_domain_events_fan_out() {
        let router = Router::new();
        let query = "b._dns-sd._udp.local.";
        router.register(query, 1, Scope::Domains(DomainKey::wildcard("")));
        router.register(query, 2, Scope::Domains(DomainKey::wildcard("local")));

        let events = router.route(
            query,
            MdnsEvent::ServiceFound(query.to_string(), "example.com.".to_string()),
        );
        assert_eq!(events.len(), 2);
        for event in events {
            match event {
                SourceEvent::Browse(BrowseEvent::DomainNew { key, flags }) => {
                    assert_eq!(key, DomainKey::wildcard("example.com"));
                    assert!(flags.contains(LookupFlags::MULTICAST));
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[test]
    fn test_meta_query_yields_service_types() {
        let router = Router::new();
        router.register(TYPES, 1, Scope::ServiceTypes(DomainKey::wildcard("local")));

        let events = router.route(
            TYPES,
            MdnsEvent::ServiceFound(TYPES.to_string(), "_ipp._tcp.local.".to_string()),
        );
        match events.as_slice() {
            [SourceEvent::Browse(BrowseEvent::ServiceTypeNew { key, .. })] => {
                assert_eq!(key.service_type, "_ipp._tcp");
                assert_eq!(key.domain, "local");
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_instance_arrival_and_removal() {
        let router = Router::new();
        router.register(HTTP, 1, http_scope());

        let found = router.route(
            HTTP,
            MdnsEvent::ServiceFound(HTTP.to_string(), "Web._http._tcp.local.".to_string()),
        );
        assert!(matches!(
            found.as_slice(),
            [SourceEvent::Browse(BrowseEvent::ServiceNew { key, .. })] if *key == web_key()
        ));

        let removed = router.route(
            HTTP,
            MdnsEvent::ServiceRemoved(HTTP.to_string(), "Web._http._tcp.local.".to_string()),
        );
        assert!(matches!(
            removed.as_slice(),
            [SourceEvent::Browse(BrowseEvent::ServiceRemove { key, .. })] if *key == web_key()
        ));
    }

    #[test]
    fn test_events_without_listeners_are_dropped() {
        let router = Router::new();
        let events = router.route(
            HTTP,
            MdnsEvent::ServiceFound(HTTP.to_string(), "Web._http._tcp.local.".to_string()),
        );
        assert!(events.is_empty());
    }

    #[test]
    fn test_pending_resolution_completes() {
        let router = Router::new();
        router.register(HTTP, 1, http_scope());

        assert!(matches!(router.request_resolution(&web_key()), Resolution::Parked));

        let events = router.route(HTTP, MdnsEvent::ServiceResolved(web_info()));
        match events.as_slice() {
            [SourceEvent::Resolve(Ok(resolved))] => {
                assert_eq!(resolved.key, web_key());
                assert_eq!(resolved.host, "web.local");
                assert_eq!(resolved.port, 8080);
                assert_eq!(resolved.protocol, Protocol::INET);
                assert_eq!(resolved.address.to_string(), "192.168.1.20");
                assert_eq!(resolved.txt, vec!["path=/admin".to_string()]);
            }
            other => panic!("unexpected events {:?}", other),
        }

        // Now cached: answered immediately
        assert!(matches!(
            router.request_resolution(&web_key()).ready().as_slice(),
            [SourceEvent::Resolve(Ok(_))]
        ));
    }

    #[test]
    fn test_repeated_request_is_parked_once() {
        let router = Router::new();
        router.register(HTTP, 1, http_scope());

        assert!(matches!(router.request_resolution(&web_key()), Resolution::Parked));
        assert!(matches!(
            router.request_resolution(&web_key()),
            Resolution::AlreadyParked
        ));

        // One result per request, not one per click
        let events = router.route(HTTP, MdnsEvent::ServiceResolved(web_info()));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_record_cached_while_parking_is_delivered() {
        let router = Router::new();
        router.register(HTTP, 1, http_scope());
        let cache_key = dnssd::instance_key("Web", "_http._tcp", "local");

        // Cache miss and park, then the pump caches the record. The request
        // rechecks before the pump drains its waiters.
        assert!(router.park(&cache_key, &web_key()));
        let record = ResolvedRecord::from_info(&web_info());
        router.resolved.insert(cache_key.clone(), record.clone());

        let events = router.recheck_parked(&cache_key).ready();
        assert!(matches!(
            events.as_slice(),
            [SourceEvent::Resolve(Ok(resolved))] if resolved.key == web_key()
        ));

        // The pump's drain finds nothing left to answer twice
        assert!(router.drain_pending(&cache_key, &record).is_empty());
    }

    #[test]
    fn test_resolved_event_caches_before_answering() {
        let router = Router::new();
        router.register(HTTP, 1, http_scope());
        assert!(matches!(router.request_resolution(&web_key()), Resolution::Parked));

        let events = router.route(HTTP, MdnsEvent::ServiceResolved(web_info()));
        assert_eq!(events.len(), 1);
        assert!(router
            .resolved
            .contains_key(&dnssd::instance_key("Web", "_http._tcp", "local")));
        assert!(router.pending.is_empty());
    }

    #[test]
    fn test_unicast_queries_report_wide_area() {
        let router = Router::new();
        let query = "_http._tcp.example.com.";
        router.register(
            query,
            1,
            Scope::Services(ServiceTypeKey::new(
                Interface::UNSPEC,
                Protocol::UNSPEC,
                "_http._tcp",
                "example.com",
            )),
        );

        let events = router.route(
            query,
            MdnsEvent::ServiceFound(query.to_string(), "Web._http._tcp.example.com.".to_string()),
        );
        match events.as_slice() {
            [SourceEvent::Browse(BrowseEvent::ServiceNew { key, flags })] => {
                assert_eq!(key.domain, "example.com");
                assert_eq!(*flags, LookupFlags::WIDE_AREA);
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_removal_fails_pending_resolution() {
        let router = Router::new();
        router.register(HTTP, 1, http_scope());
        router.route(HTTP, MdnsEvent::ServiceResolved(web_info()));
        router.route(
            HTTP,
            MdnsEvent::ServiceRemoved(HTTP.to_string(), "Web._http._tcp.local.".to_string()),
        );

        // The cache entry went with the removal
        assert!(matches!(router.request_resolution(&web_key()), Resolution::Parked));

        let events = router.route(
            HTTP,
            MdnsEvent::ServiceRemoved(HTTP.to_string(), "Web._http._tcp.local.".to_string()),
        );
        assert!(events
            .iter()
            .any(|e| matches!(e, SourceEvent::Resolve(Err(err)) if err.key == web_key())));
    }
}
