//! Contract between the orchestrator and a discovery backend.
//!
//! A backend turns subscribe calls into browse operations on the daemon and
//! reports what it sees as [`SourceEvent`]s on a channel the consumer drains
//! from its own thread. Nothing here blocks.

use crate::error::{DiscoveryError, ResolveError};
use crate::types::{DomainKey, LookupFlags, ResolvedService, ServiceKey, ServiceTypeKey};

pub use crate::naming::InterfaceNames;

/// Arrival and removal notifications produced by active subscriptions.
#[derive(Debug, Clone, PartialEq)]
pub enum BrowseEvent {
    /// A (sub-)domain was found by a domain subscription
    DomainNew { key: DomainKey, flags: LookupFlags },

    /// A service type was found by a service-type subscription
    ServiceTypeNew { key: ServiceTypeKey, flags: LookupFlags },

    /// A service instance appeared
    ServiceNew { key: ServiceKey, flags: LookupFlags },

    /// A service instance went away
    ServiceRemove { key: ServiceKey, flags: LookupFlags },
}

/// Everything a backend delivers to its consumer.
#[derive(Debug, Clone)]
pub enum SourceEvent {
    Browse(BrowseEvent),

    /// Completion of an earlier [`DiscoverySource::resolve_service`] call
    Resolve(Result<ResolvedService, ResolveError>),
}

impl From<BrowseEvent> for SourceEvent {
    fn from(event: BrowseEvent) -> Self {
        SourceEvent::Browse(event)
    }
}

/// A connected discovery daemon.
///
/// Subscriptions live as long as the returned handle is kept; the
/// orchestrator keeps every handle for the whole session.
pub trait DiscoverySource: InterfaceNames {
    /// Handle for one active browse operation.
    type Subscription;

    /// Browse for sub-domains of `scope`, emitting [`BrowseEvent::DomainNew`].
    fn subscribe_domains(&self, scope: &DomainKey) -> Result<Self::Subscription, DiscoveryError>;

    /// Browse for service types in `scope`, emitting [`BrowseEvent::ServiceTypeNew`].
    fn subscribe_service_types(
        &self,
        scope: &DomainKey,
    ) -> Result<Self::Subscription, DiscoveryError>;

    /// Browse for instances of one service type, emitting
    /// [`BrowseEvent::ServiceNew`] and [`BrowseEvent::ServiceRemove`].
    fn subscribe_services(
        &self,
        scope: &ServiceTypeKey,
    ) -> Result<Self::Subscription, DiscoveryError>;

    /// Starts resolving an instance; the outcome arrives later as
    /// [`SourceEvent::Resolve`].
    fn resolve_service(&self, key: &ServiceKey) -> Result<(), DiscoveryError>;
}
