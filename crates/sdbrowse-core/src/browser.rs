//! Browse orchestrator.
//!
//! The [`Browser`] owns the dedup state and cascades subscriptions:
//! a new domain gets a sub-domain browse and (unless it is the empty
//! "browse all" scope) a service-type browse; a new service type gets an
//! instance browse; instance arrivals and removals are relayed to the
//! presentation hooks.
//!
//! Every key moves from unknown to subscribed at most once per session. There
//! is no way back: domains and service types accumulate until the process
//! exits.
//!
//! All methods run on the thread that drains the source's event channel, so a
//! cascade triggered by one event is fully registered before the next event is
//! looked at.

use crate::config::BrowseOptions;
use crate::error::{BrowseError, DiscoveryError};
use crate::naming::{self, InterfaceNames};
use crate::source::{BrowseEvent, DiscoverySource};
use crate::types::{DomainKey, LookupFlags, ServiceKey, ServiceTypeKey};
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info, warn};

/// Called for each new non-empty domain.
pub type DomainHook = Box<dyn FnMut(&DomainKey, LookupFlags)>;
/// Called for each new service type.
pub type ServiceTypeHook = Box<dyn FnMut(&ServiceTypeKey, LookupFlags)>;
/// Called for each service instance arrival or removal.
pub type ServiceHook = Box<dyn FnMut(&ServiceKey, LookupFlags)>;

/// Optional observers of the orchestrator. An unset slot is skipped.
#[derive(Default)]
pub struct BrowseHooks {
    pub on_new_domain: Option<DomainHook>,
    pub on_new_service_type: Option<ServiceTypeHook>,
    pub on_new_service: Option<ServiceHook>,
    pub on_remove_service: Option<ServiceHook>,
}

impl BrowseHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_new_domain(mut self, hook: impl FnMut(&DomainKey, LookupFlags) + 'static) -> Self {
        self.on_new_domain = Some(Box::new(hook));
        self
    }

    pub fn on_new_service_type(
        mut self,
        hook: impl FnMut(&ServiceTypeKey, LookupFlags) + 'static,
    ) -> Self {
        self.on_new_service_type = Some(Box::new(hook));
        self
    }

    pub fn on_new_service(mut self, hook: impl FnMut(&ServiceKey, LookupFlags) + 'static) -> Self {
        self.on_new_service = Some(Box::new(hook));
        self
    }

    pub fn on_remove_service(
        mut self,
        hook: impl FnMut(&ServiceKey, LookupFlags) + 'static,
    ) -> Self {
        self.on_remove_service = Some(Box::new(hook));
        self
    }
}

impl std::fmt::Debug for BrowseHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowseHooks")
            .field("on_new_domain", &self.on_new_domain.is_some())
            .field("on_new_service_type", &self.on_new_service_type.is_some())
            .field("on_new_service", &self.on_new_service.is_some())
            .field("on_remove_service", &self.on_remove_service.is_some())
            .finish()
    }
}

/// Deduplicating, cascading browser over a [`DiscoverySource`].
pub struct Browser<S: DiscoverySource> {
    source: S,
    hooks: BrowseHooks,

    /// Every domain scope subscribed this session
    known_domains: HashSet<DomainKey>,

    /// Domains already handed to `on_new_domain`
    announced_domains: HashSet<DomainKey>,

    /// Sub-domain browse per known domain
    domain_browsers: HashMap<DomainKey, S::Subscription>,

    /// Service-type browse per non-empty domain
    service_type_browsers: HashMap<DomainKey, S::Subscription>,

    /// Instance browse per discovered service type
    service_browsers: HashMap<ServiceTypeKey, S::Subscription>,
}

impl<S: DiscoverySource> Browser<S> {
    /// Wraps an already connected source. No subscription is made yet.
    pub fn new(source: S, hooks: BrowseHooks) -> Self {
        Self {
            source,
            hooks,
            known_domains: HashSet::new(),
            announced_domains: HashSet::new(),
            domain_browsers: HashMap::new(),
            service_type_browsers: HashMap::new(),
            service_browsers: HashMap::new(),
        }
    }

    /// Connects to the daemon and seeds the initial domains.
    ///
    /// # Errors
    ///
    /// A connection failure is fatal: it is logged and returned before any
    /// browser state exists.
    pub fn start<F>(connect: F, hooks: BrowseHooks, options: &BrowseOptions) -> Result<Self, BrowseError>
    where
        F: FnOnce() -> Result<S, DiscoveryError>,
    {
        let source = connect().map_err(|e| {
            error!(error = %e, "Failed to connect to the discovery daemon");
            BrowseError::from(e)
        })?;

        let mut browser = Self::new(source, hooks);
        browser.initialize(options);
        Ok(browser)
    }

    /// Seeds `local`, the empty "every browsable domain" scope and the extra
    /// domains, all on the wildcard interface and protocol.
    pub fn initialize(&mut self, options: &BrowseOptions) {
        if options.browse_local {
            self.add_domain(DomainKey::wildcard("local"), LookupFlags::NONE);
        }

        if options.browse_all_domains {
            self.add_domain(DomainKey::wildcard(""), LookupFlags::NONE);
        }

        for domain in options.normalized_domains() {
            self.add_domain(DomainKey::wildcard(domain), LookupFlags::NONE);
        }
    }

    /// Routes one event from the source to the matching operation.
    pub fn dispatch(&mut self, event: BrowseEvent) {
        match event {
            BrowseEvent::DomainNew { key, flags } => self.add_domain(key, flags),
            BrowseEvent::ServiceTypeNew { key, flags } => self.add_service_type(key, flags),
            BrowseEvent::ServiceNew { key, flags } => self.add_service(&key, flags),
            BrowseEvent::ServiceRemove { key, flags } => self.remove_service(&key, flags),
        }
    }

    /// Starts browsing a domain unless it is already known.
    pub fn add_domain(&mut self, key: DomainKey, flags: LookupFlags) {
        if self.known_domains.contains(&key) {
            debug!(domain = %self.label(&key), "Domain already browsed");
            return;
        }

        if !key.is_browse_all() {
            // Retries after a failed subscribe must not add a second node
            if self.announced_domains.insert(key.clone()) {
                info!(domain = %self.label(&key), "Add domain");
                if let Some(hook) = self.hooks.on_new_domain.as_mut() {
                    hook(&key, flags);
                }
            }

            // A previous attempt may have got this far before its
            // sub-domain browse failed.
            if !self.service_type_browsers.contains_key(&key) {
                match self.source.subscribe_service_types(&key) {
                    Ok(subscription) => {
                        self.service_type_browsers.insert(key.clone(), subscription);
                    }
                    Err(e) => {
                        warn!(domain = %self.label(&key), error = %e, "Failed to browse service types");
                    }
                }
            }
        }

        match self.source.subscribe_domains(&key) {
            Ok(subscription) => {
                self.domain_browsers.insert(key.clone(), subscription);
                self.known_domains.insert(key);
            }
            Err(e) => {
                warn!(domain = %self.label(&key), error = %e, "Failed to browse sub-domains");
            }
        }
    }

    /// Starts browsing instances of a service type unless already browsing.
    pub fn add_service_type(&mut self, key: ServiceTypeKey, flags: LookupFlags) {
        if self.service_browsers.contains_key(&key) {
            debug!(
                service_type = %key.service_type,
                domain = %self.label(&key.domain_key()),
                "Don't browse twice service type"
            );
            return;
        }

        debug!(
            service_type = %key.service_type,
            domain = %self.label(&key.domain_key()),
            "Browsing for services"
        );
        if let Some(hook) = self.hooks.on_new_service_type.as_mut() {
            hook(&key, flags);
        }

        match self.source.subscribe_services(&key) {
            Ok(subscription) => {
                self.service_browsers.insert(key, subscription);
            }
            Err(e) => {
                warn!(service_type = %key.service_type, error = %e, "Failed to browse services");
            }
        }
    }

    /// Relays a service arrival.
    pub fn add_service(&mut self, key: &ServiceKey, flags: LookupFlags) {
        info!(
            name = %key.name,
            service_type = %key.service_type,
            domain = %self.label(&key.domain_key()),
            "Found service"
        );
        if let Some(hook) = self.hooks.on_new_service.as_mut() {
            hook(key, flags);
        }
    }

    /// Relays a service removal.
    pub fn remove_service(&mut self, key: &ServiceKey, flags: LookupFlags) {
        info!(
            name = %key.name,
            service_type = %key.service_type,
            domain = %self.label(&key.domain_key()),
            "Service disappeared"
        );
        if let Some(hook) = self.hooks.on_remove_service.as_mut() {
            hook(key, flags);
        }
    }

    /// Asks the source to resolve an instance; see [`DiscoverySource::resolve_service`].
    pub fn resolve_service(&self, key: &ServiceKey) -> Result<(), DiscoveryError> {
        debug!(service = %key, "Resolving service");
        self.source.resolve_service(key)
    }

    /// Human label for a domain scope (`local`, `local on eth0 IPv4`).
    pub fn label(&self, key: &DomainKey) -> String {
        naming::domain_label(key.interface, key.protocol, &key.domain, Some(self.names()))
    }

    /// Human label for an interface/protocol pair (`Wide Area`, `eth0 IPv6`).
    pub fn interface_protocol_label(&self, key: &ServiceKey) -> String {
        naming::interface_protocol_name(key.interface, key.protocol, Some(self.names()))
    }

    fn names(&self) -> &dyn InterfaceNames {
        &self.source
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn is_known_domain(&self, key: &DomainKey) -> bool {
        self.known_domains.contains(key)
    }

    pub fn known_domains(&self) -> impl Iterator<Item = &DomainKey> {
        self.known_domains.iter()
    }

    pub fn is_browsing_service_types(&self, key: &DomainKey) -> bool {
        self.service_type_browsers.contains_key(key)
    }

    pub fn is_browsing_services(&self, key: &ServiceTypeKey) -> bool {
        self.service_browsers.contains_key(key)
    }

    pub fn domain_subscription_count(&self) -> usize {
        self.domain_browsers.len()
    }

    pub fn service_type_subscription_count(&self) -> usize {
        self.service_type_browsers.len()
    }

    pub fn service_subscription_count(&self) -> usize {
        self.service_browsers.len()
    }
}
