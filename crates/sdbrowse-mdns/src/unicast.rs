//! Wide-area DNS-SD over unicast DNS.
//!
//! Unicast DNS has no change notifications, so each browsed PTR name is
//! polled. The difference between two polls is turned into the same
//! found/removed events the mDNS daemon emits and handed to the
//! [`Router`], which treats both transports alike.

use crate::dnssd;
use crate::router::{ResolvedRecord, Router};
use async_channel::Sender;
use hickory_proto::rr::{Name, RData, RecordType};
use hickory_resolver::{Resolver, TokioResolver};
use mdns_sd::ServiceEvent as MdnsEvent;
use sdbrowse_core::source::SourceEvent;
use sdbrowse_core::types::ServiceKey;
use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Unicast DNS client used for every domain except `local`.
pub(crate) struct UnicastBrowser {
    resolver: TokioResolver,
}

impl UnicastBrowser {
    /// Reads the system resolver configuration. Call from inside the runtime.
    pub(crate) fn from_system_conf() -> Result<Self, String> {
        let resolver = Resolver::builder_tokio()
            .map(|builder| builder.build())
            .map_err(|e| e.to_string())?;
        Ok(Self { resolver })
    }

    async fn records(&self, name: Name, record_type: RecordType) -> Result<Vec<RData>, String> {
        match self.resolver.lookup(name, record_type).await {
            Ok(lookup) => Ok(lookup.record_iter().map(|r| r.data().clone()).collect()),
            Err(e) if e.is_no_records_found() => Ok(Vec::new()),
            Err(e) => Err(e.to_string()),
        }
    }

    /// PTR targets of `query`, as absolute names.
    pub(crate) async fn browse(&self, query: &str) -> Result<BTreeSet<String>, String> {
        let name = Name::from_ascii(query).map_err(|e| e.to_string())?;
        let records = self.records(name, RecordType::PTR).await?;
        Ok(ptr_targets(&records))
    }

    /// Looks up the SRV, TXT and address records of one instance.
    pub(crate) async fn resolve(&self, key: &ServiceKey) -> Result<ResolvedRecord, String> {
        let name = instance_name(key)?;

        let srv = self.records(name.clone(), RecordType::SRV).await?;
        let Some((target, port)) = pick_srv(&srv) else {
            return Err("no SRV record for the instance".to_string());
        };

        let txt = match self.records(name, RecordType::TXT).await {
            Ok(records) => txt_strings(&records),
            Err(e) => {
                debug!(service = %key, error = %e, "TXT lookup failed");
                Vec::new()
            }
        };

        let mut addresses = ip_addrs(&self.records(target.clone(), RecordType::A).await?);
        match self.records(target.clone(), RecordType::AAAA).await {
            Ok(records) => addresses.extend(ip_addrs(&records)),
            Err(e) => debug!(host = %target, error = %e, "AAAA lookup failed"),
        }

        Ok(ResolvedRecord::new(&absolute_name(&target), addresses, port, txt))
    }
}

/// Polls one PTR name until the consumer goes away.
pub(crate) async fn poll(
    query: String,
    browser: Arc<UnicastBrowser>,
    router: Arc<Router>,
    event_tx: Sender<SourceEvent>,
    interval: Duration,
) {
    let mut known = BTreeSet::new();
    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;
        if event_tx.is_closed() {
            debug!(query = %query, "Event channel closed, stopping unicast poll");
            return;
        }

        let current = match browser.browse(&query).await {
            Ok(current) => current,
            Err(e) => {
                warn!(query = %query, error = %e, "Unicast browse failed");
                continue;
            }
        };

        for change in changes(&query, &known, &current) {
            for event in router.route(&query, change) {
                if event_tx.send(event).await.is_err() {
                    debug!(query = %query, "Event channel closed, stopping unicast poll");
                    return;
                }
            }
        }
        known = current;
    }
}

/// Resolves one instance and answers every request parked for it.
pub(crate) async fn resolve(
    key: ServiceKey,
    browser: Arc<UnicastBrowser>,
    router: Arc<Router>,
    event_tx: Sender<SourceEvent>,
) {
    let cache_key = dnssd::instance_key(&key.name, &key.service_type, &key.domain);

    let events = match browser.resolve(&key).await {
        Ok(record) => router.complete(cache_key, record),
        Err(reason) => {
            debug!(service = %key, error = %reason, "Unicast resolve failed");
            router.fail_pending(&cache_key, &reason)
        }
    };

    for event in events {
        if event_tx.send(event).await.is_err() {
            warn!("Event channel closed before resolve result was delivered");
            return;
        }
    }
}

/// Events that turn the `known` PTR targets into `current`.
fn changes(query: &str, known: &BTreeSet<String>, current: &BTreeSet<String>) -> Vec<MdnsEvent> {
    let found = current
        .difference(known)
        .map(|target| MdnsEvent::ServiceFound(query.to_string(), target.clone()));
    let removed = known
        .difference(current)
        .map(|target| MdnsEvent::ServiceRemoved(query.to_string(), target.clone()));
    found.chain(removed).collect()
}

/// `My Printer._ipp._tcp.example.com.`, keeping the instance as one label
/// whatever it contains.
fn instance_name(key: &ServiceKey) -> Result<Name, String> {
    let mut labels: Vec<&[u8]> = vec![key.name.as_bytes()];
    labels.extend(
        key.service_type
            .split('.')
            .chain(key.domain.split('.'))
            .filter(|label| !label.is_empty())
            .map(str::as_bytes),
    );
    Name::from_labels(labels).map_err(|e| e.to_string())
}

/// Labels joined with dots, without escaping.
fn absolute_name(name: &Name) -> String {
    let mut out = String::new();
    for label in name.iter() {
        out.push_str(&String::from_utf8_lossy(label));
        out.push('.');
    }
    if out.is_empty() {
        out.push('.');
    }
    out
}

fn ptr_targets(records: &[RData]) -> BTreeSet<String> {
    records
        .iter()
        .filter_map(|data| match data {
            RData::PTR(ptr) => Some(absolute_name(&ptr.0)),
            _ => None,
        })
        .collect()
}

/// Lowest priority first, then highest weight. A root target means the
/// service is not offered.
fn pick_srv(records: &[RData]) -> Option<(Name, u16)> {
    records
        .iter()
        .filter_map(|data| match data {
            RData::SRV(srv) => Some(srv),
            _ => None,
        })
        .min_by_key(|srv| (srv.priority(), Reverse(srv.weight())))
        .filter(|srv| !srv.target().is_root())
        .map(|srv| (srv.target().clone(), srv.port()))
}

fn txt_strings(records: &[RData]) -> Vec<String> {
    records
        .iter()
        .filter_map(|data| match data {
            RData::TXT(txt) => Some(txt),
            _ => None,
        })
        .flat_map(|txt| txt.txt_data().iter())
        .map(|raw| String::from_utf8_lossy(raw).into_owned())
        .filter(|entry| !entry.is_empty())
        .collect()
}

fn ip_addrs(records: &[RData]) -> Vec<IpAddr> {
    records
        .iter()
        .filter_map(|data| match data {
            RData::A(a) => Some(IpAddr::V4(a.0)),
            RData::AAAA(a) => Some(IpAddr::V6(a.0)),
            _ => None,
        })
        .collect()
}
