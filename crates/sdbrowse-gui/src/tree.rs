//! Domain → service type → service tree shown in the main window.
//!
//! The tree mirrors the orchestrator's three key spaces with one node map
//! each. Ancestors are created on demand when a service arrives and pruned
//! leaf-to-root when it goes away.

use sdbrowse_core::naming::{self, InterfaceNames};
use sdbrowse_core::service_db::ServiceTypeDatabase;
use sdbrowse_core::types::{DomainKey, Interface, Protocol, ServiceKey, ServiceTypeKey};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

/// Stable node handle, also used as the widget id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

/// What a node stands for.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Domain(DomainKey),
    ServiceType(ServiceTypeKey),
    Service(ServiceKey),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub label: String,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Tree inconsistencies. Logged by the caller, never fatal.
#[derive(Debug, Error, PartialEq)]
pub enum TreeError {
    #[error("Removed service doesn't exist in tree: '{0}'")]
    UnknownService(ServiceKey),
}

pub struct ServiceTree {
    nodes: HashMap<NodeId, Node>,
    roots: Vec<NodeId>,
    next_id: u64,

    domain_nodes: HashMap<DomainKey, NodeId>,
    type_nodes: HashMap<ServiceTypeKey, NodeId>,
    service_nodes: HashMap<ServiceKey, NodeId>,

    /// Expand new services while every domain seen so far is local
    unfold_local: bool,

    /// Nodes to open on the next frame
    expand_requests: HashSet<NodeId>,

    service_types: ServiceTypeDatabase,
    names: Box<dyn InterfaceNames>,
}

impl ServiceTree {
    pub fn new(service_types: ServiceTypeDatabase, names: Box<dyn InterfaceNames>) -> Self {
        Self {
            nodes: HashMap::new(),
            roots: Vec::new(),
            next_id: 1,
            domain_nodes: HashMap::new(),
            type_nodes: HashMap::new(),
            service_nodes: HashMap::new(),
            unfold_local: true,
            expand_requests: HashSet::new(),
            service_types,
            names,
        }
    }

    /// Adds a node for a newly announced domain.
    ///
    /// The wildcard `local` domain is skipped: it is created lazily by its
    /// first service, so it only shows up once it has something to show.
    pub fn add_domain(&mut self, key: &DomainKey) {
        if key.interface == Interface::UNSPEC
            && key.protocol == Protocol::UNSPEC
            && key.domain == "local"
        {
            return;
        }
        self.domain_node(key);
    }

    /// Adds a service and any missing ancestors. Returns the service node.
    pub fn add_service(&mut self, key: &ServiceKey) -> NodeId {
        if let Some(&id) = self.service_nodes.get(key) {
            return id;
        }

        let parent = self.type_node(&key.service_type_key());
        let id = self.insert(Some(parent), key.name.clone(), NodeKind::Service(key.clone()));
        self.service_nodes.insert(key.clone(), id);

        if self.unfold_local || !is_local(&key.domain) {
            self.expand_to(id);
        }

        id
    }

    /// Removes a service, then every ancestor the removal left empty.
    pub fn remove_service(&mut self, key: &ServiceKey) -> Result<(), TreeError> {
        let Some(id) = self.service_nodes.remove(key) else {
            return Err(TreeError::UnknownService(key.clone()));
        };

        let mut parent = self.detach(id);
        while let Some(ancestor) = parent {
            let has_children = self
                .nodes
                .get(&ancestor)
                .map(|node| !node.children.is_empty())
                .unwrap_or(true);
            if has_children {
                break;
            }

            match self.nodes.get(&ancestor).map(|node| node.kind.clone()) {
                Some(NodeKind::ServiceType(type_key)) => {
                    self.type_nodes.remove(&type_key);
                }
                Some(NodeKind::Domain(domain_key)) => {
                    self.domain_nodes.remove(&domain_key);
                }
                Some(NodeKind::Service(_)) | None => break,
            }
            debug!(node = ?ancestor, "Pruning empty node");
            parent = self.detach(ancestor);
        }

        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn domain_node_id(&self, key: &DomainKey) -> Option<NodeId> {
        self.domain_nodes.get(key).copied()
    }

    pub fn type_node_id(&self, key: &ServiceTypeKey) -> Option<NodeId> {
        self.type_nodes.get(key).copied()
    }

    pub fn service_node_id(&self, key: &ServiceKey) -> Option<NodeId> {
        self.service_nodes.get(key).copied()
    }

    /// Consumes a pending expansion for `id`.
    pub fn take_expand_request(&mut self, id: NodeId) -> bool {
        self.expand_requests.remove(&id)
    }

    pub fn unfolds_local(&self) -> bool {
        self.unfold_local
    }

    fn domain_node(&mut self, key: &DomainKey) -> NodeId {
        if let Some(&id) = self.domain_nodes.get(key) {
            return id;
        }

        if !is_local(&key.domain) {
            self.unfold_local = false;
        }

        let is_wildcard = key.interface == Interface::UNSPEC && key.protocol == Protocol::UNSPEC;
        let parent = if !is_wildcard && key.domain == "local" {
            Some(self.domain_node(&DomainKey::wildcard("local")))
        } else {
            self.parent_domain(key)
        };

        let label = naming::domain_label(
            key.interface,
            key.protocol,
            &key.domain,
            Some(self.names.as_ref()),
        );
        let id = self.insert(parent, label, NodeKind::Domain(key.clone()));
        self.domain_nodes.insert(key.clone(), id);
        id
    }

    fn type_node(&mut self, key: &ServiceTypeKey) -> NodeId {
        if let Some(&id) = self.type_nodes.get(key) {
            return id;
        }

        let parent = self.domain_node(&key.domain_key());
        let label = naming::service_type_label(&key.service_type, &self.service_types);
        let id = self.insert(Some(parent), label, NodeKind::ServiceType(key.clone()));
        self.type_nodes.insert(key.clone(), id);
        id
    }

    /// Closest enclosing domain on the same interface and protocol.
    fn parent_domain(&self, key: &DomainKey) -> Option<NodeId> {
        self.domain_nodes
            .iter()
            .filter(|(candidate, _)| {
                candidate.interface == key.interface
                    && candidate.protocol == key.protocol
                    && is_subdomain(&key.domain, &candidate.domain)
            })
            .max_by_key(|(candidate, _)| candidate.domain.len())
            .map(|(_, &id)| id)
    }

    fn insert(&mut self, parent: Option<NodeId>, label: String, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;

        self.nodes.insert(
            id,
            Node {
                label,
                kind,
                parent,
                children: Vec::new(),
            },
        );

        match parent.and_then(|p| self.nodes.get_mut(&p)) {
            Some(parent) => parent.children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Removes a childless node; returns its former parent.
    fn detach(&mut self, id: NodeId) -> Option<NodeId> {
        self.expand_requests.remove(&id);
        let node = self.nodes.remove(&id)?;

        match node.parent.and_then(|p| self.nodes.get_mut(&p)) {
            Some(parent) => parent.children.retain(|c| *c != id),
            None => self.roots.retain(|r| *r != id),
        }
        node.parent
    }

    fn expand_to(&mut self, id: NodeId) {
        let mut current = self.nodes.get(&id).and_then(|n| n.parent);
        while let Some(ancestor) = current {
            self.expand_requests.insert(ancestor);
            current = self.nodes.get(&ancestor).and_then(|n| n.parent);
        }
    }
}

fn is_local(domain: &str) -> bool {
    domain == "local" || domain.ends_with(".local")
}

/// `a.example.com` is a sub-domain of `example.com` but not of `ample.com`.
fn is_subdomain(domain: &str, parent: &str) -> bool {
    !parent.is_empty()
        && domain.len() > parent.len()
        && domain.ends_with(parent)
        && domain[..domain.len() - parent.len()].ends_with('.')
}
