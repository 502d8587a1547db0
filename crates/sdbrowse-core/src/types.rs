//! Core types for the DNS-SD service browser.
//!
//! This module defines the identity keys the orchestrator deduplicates on, the
//! interface/protocol values reported by the discovery daemon, and the record
//! produced when a service instance is resolved.

use chrono::{DateTime, Utc};
use std::fmt;
use std::net::IpAddr;

/// Network interface index as reported by the discovery daemon.
///
/// Non-positive values carry no interface; [`Interface::UNSPEC`] is the
/// wildcard meaning "across all interfaces".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Interface(pub i32);

impl Interface {
    /// Wildcard: browse on every interface.
    pub const UNSPEC: Interface = Interface(-1);

    /// Returns true if this value names a concrete interface.
    pub fn is_specified(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address family code as reported by the discovery daemon.
///
/// [`Protocol::UNSPEC`] is the wildcard meaning "both IPv4 and IPv6".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Protocol(pub i32);

impl Protocol {
    /// Wildcard: browse over both address families.
    pub const UNSPEC: Protocol = Protocol(-1);
    /// IPv4.
    pub const INET: Protocol = Protocol(0);
    /// IPv6.
    pub const INET6: Protocol = Protocol(1);

    /// Returns the protocol matching the family of `addr`.
    pub fn of_address(addr: &IpAddr) -> Protocol {
        match addr {
            IpAddr::V4(_) => Protocol::INET,
            IpAddr::V6(_) => Protocol::INET6,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lookup result flags attached to every arrival and removal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LookupFlags(pub u32);

impl LookupFlags {
    pub const NONE: LookupFlags = LookupFlags(0);
    /// Answer came from the local cache.
    pub const CACHED: LookupFlags = LookupFlags(1);
    /// Answer came from wide-area (unicast) DNS.
    pub const WIDE_AREA: LookupFlags = LookupFlags(2);
    /// Answer came from multicast DNS.
    pub const MULTICAST: LookupFlags = LookupFlags(4);
    /// Record is local to this host.
    pub const LOCAL: LookupFlags = LookupFlags(8);
    /// Record was registered by this process.
    pub const OUR_OWN: LookupFlags = LookupFlags(16);
    /// Record is statically configured.
    pub const STATIC: LookupFlags = LookupFlags(32);

    /// Returns true if every bit of `other` is set.
    pub fn contains(&self, other: LookupFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for LookupFlags {
    type Output = LookupFlags;

    fn bitor(self, rhs: LookupFlags) -> LookupFlags {
        LookupFlags(self.0 | rhs.0)
    }
}

/// Identifies one domain-browse scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainKey {
    pub interface: Interface,
    pub protocol: Protocol,
    pub domain: String,
}

impl DomainKey {
    pub fn new(interface: Interface, protocol: Protocol, domain: impl Into<String>) -> Self {
        Self {
            interface,
            protocol,
            domain: domain.into(),
        }
    }

    /// Scope on every interface and protocol.
    pub fn wildcard(domain: impl Into<String>) -> Self {
        Self::new(Interface::UNSPEC, Protocol::UNSPEC, domain)
    }

    /// The empty domain stands for "every browsable domain", not a real one.
    pub fn is_browse_all(&self) -> bool {
        self.domain.is_empty()
    }
}

/// Identifies one service-type-browse scope within a domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceTypeKey {
    pub interface: Interface,
    pub protocol: Protocol,
    pub service_type: String,
    pub domain: String,
}

impl ServiceTypeKey {
    pub fn new(
        interface: Interface,
        protocol: Protocol,
        service_type: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            interface,
            protocol,
            service_type: service_type.into(),
            domain: domain.into(),
        }
    }

    /// The domain this service type was found in.
    pub fn domain_key(&self) -> DomainKey {
        DomainKey::new(self.interface, self.protocol, self.domain.clone())
    }
}

/// Identifies one discovered service instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceKey {
    pub interface: Interface,
    pub protocol: Protocol,
    pub name: String,
    pub service_type: String,
    pub domain: String,
}

impl ServiceKey {
    pub fn new(
        interface: Interface,
        protocol: Protocol,
        name: impl Into<String>,
        service_type: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            interface,
            protocol,
            name: name.into(),
            service_type: service_type.into(),
            domain: domain.into(),
        }
    }

    pub fn service_type_key(&self) -> ServiceTypeKey {
        ServiceTypeKey::new(
            self.interface,
            self.protocol,
            self.service_type.clone(),
            self.domain.clone(),
        )
    }

    pub fn domain_key(&self) -> DomainKey {
        DomainKey::new(self.interface, self.protocol, self.domain.clone())
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.name, self.service_type, self.domain)
    }
}

/// A service instance resolved to its host, address, port and TXT data.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedService {
    pub key: ServiceKey,

    /// Target host name (e.g. `printer.local`)
    pub host: String,

    /// Address family of `address`
    pub protocol: Protocol,

    pub address: IpAddr,

    pub port: u16,

    /// Raw TXT strings in advertisement order (`key=value` or a bare `key`)
    pub txt: Vec<String>,

    pub resolved_at: DateTime<Utc>,
}
