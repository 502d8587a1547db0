//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use sdbrowse_core::error::DiscoveryError;
use sdbrowse_core::service_db::ServiceTypeDatabase;
use sdbrowse_core::source::{BrowseEvent, DiscoverySource, InterfaceNames};
use sdbrowse_core::types::{
    DomainKey, Interface, LookupFlags, Protocol, ServiceKey, ServiceTypeKey,
};
use sdbrowse_gui::{ServiceTree, ViewState};
use std::cell::RefCell;
use std::rc::Rc;

/// Interface index the fake sources know by name
pub const ETH0: Interface = Interface(3);

/// Discovery source that records every request and never emits on its own.
#[derive(Default)]
pub struct RecordingSource {
    pub subscriptions: RefCell<Vec<String>>,
    pub resolves: RefCell<Vec<ServiceKey>>,
}

impl RecordingSource {
    pub fn subscription_count(&self, prefix: &str) -> usize {
        self.subscriptions
            .borrow()
            .iter()
            .filter(|s| s.starts_with(prefix))
            .count()
    }
}

impl InterfaceNames for RecordingSource {
    fn interface_name(&self, interface: Interface) -> Option<String> {
        eth0_only(interface)
    }
}

impl DiscoverySource for RecordingSource {
    type Subscription = ();

    fn subscribe_domains(&self, scope: &DomainKey) -> Result<(), DiscoveryError> {
        self.subscriptions
            .borrow_mut()
            .push(format!("domains {}", scope.domain));
        Ok(())
    }

    fn subscribe_service_types(&self, scope: &DomainKey) -> Result<(), DiscoveryError> {
        self.subscriptions
            .borrow_mut()
            .push(format!("types {}", scope.domain));
        Ok(())
    }

    fn subscribe_services(&self, scope: &ServiceTypeKey) -> Result<(), DiscoveryError> {
        self.subscriptions
            .borrow_mut()
            .push(format!("services {}.{}", scope.service_type, scope.domain));
        Ok(())
    }

    fn resolve_service(&self, key: &ServiceKey) -> Result<(), DiscoveryError> {
        self.resolves.borrow_mut().push(key.clone());
        Ok(())
    }
}

pub fn eth0_only(interface: Interface) -> Option<String> {
    (interface == ETH0).then(|| "eth0".to_string())
}

/// Fresh view state with the built-in service type table.
pub fn new_view() -> Rc<RefCell<ViewState>> {
    let tree = ServiceTree::new(ServiceTypeDatabase::builtin(), Box::new(eth0_only));
    Rc::new(RefCell::new(ViewState::new(tree)))
}

pub fn service(name: &str, service_type: &str, domain: &str) -> ServiceKey {
    ServiceKey::new(Interface::UNSPEC, Protocol::UNSPEC, name, service_type, domain)
}

pub fn type_new(service_type: &str, domain: &str) -> BrowseEvent {
    BrowseEvent::ServiceTypeNew {
        key: ServiceTypeKey::new(Interface::UNSPEC, Protocol::UNSPEC, service_type, domain),
        flags: LookupFlags::MULTICAST,
    }
}

pub fn service_new(key: &ServiceKey) -> BrowseEvent {
    BrowseEvent::ServiceNew {
        key: key.clone(),
        flags: LookupFlags::MULTICAST,
    }
}

pub fn service_remove(key: &ServiceKey) -> BrowseEvent {
    BrowseEvent::ServiceRemove {
        key: key.clone(),
        flags: LookupFlags::MULTICAST,
    }
}
