//! Human-readable labels for interfaces, protocols, domains and service types.
//!
//! Everything here is pure: the only outside knowledge comes from the optional
//! [`InterfaceNames`] capability and the [`ServiceTypeDatabase`] passed in.

use crate::service_db::ServiceTypeDatabase;
use crate::types::{Interface, Protocol};

/// Resolves interface indices to OS interface names (`eth0`, `wlan0`, ...).
pub trait InterfaceNames {
    /// Returns `None` when the index is unknown to the OS.
    fn interface_name(&self, interface: Interface) -> Option<String>;
}

impl<F> InterfaceNames for F
where
    F: Fn(Interface) -> Option<String>,
{
    fn interface_name(&self, interface: Interface) -> Option<String> {
        self(interface)
    }
}

/// `IPv4`, `IPv6`, `n/a` for the wildcard, `unk_proto_<n>` otherwise.
pub fn protocol_name(protocol: Protocol) -> String {
    match protocol {
        Protocol::INET => "IPv4".to_string(),
        Protocol::INET6 => "IPv6".to_string(),
        Protocol(code) if code < 0 => "n/a".to_string(),
        Protocol(code) => format!("unk_proto_{}", code),
    }
}

/// OS name of the interface, `n/a` when unset, `iface_<n>` without a resolver.
pub fn interface_name(interface: Interface, names: Option<&dyn InterfaceNames>) -> String {
    if !interface.is_specified() {
        return "n/a".to_string();
    }

    names
        .and_then(|names| names.interface_name(interface))
        .unwrap_or_else(|| format!("iface_{}", interface.0))
}

/// `Wide Area` when both values are wildcards, else `<interface> <protocol>`.
pub fn interface_protocol_name(
    interface: Interface,
    protocol: Protocol,
    names: Option<&dyn InterfaceNames>,
) -> String {
    if interface == Interface::UNSPEC && protocol == Protocol::UNSPEC {
        return "Wide Area".to_string();
    }

    format!(
        "{} {}",
        interface_name(interface, names),
        protocol_name(protocol)
    )
}

/// The bare domain when neither interface nor protocol is set, otherwise
/// `<domain> on <interface> <protocol>`.
pub fn domain_label(
    interface: Interface,
    protocol: Protocol,
    domain: &str,
    names: Option<&dyn InterfaceNames>,
) -> String {
    if interface.0 <= 0 && protocol.0 <= 0 {
        return domain.to_string();
    }

    format!(
        "{} on {}",
        domain,
        interface_protocol_name(interface, protocol, names)
    )
}

/// Description of a raw DNS-SD type, or the raw type itself on a miss.
pub fn service_type_label(service_type: &str, database: &ServiceTypeDatabase) -> String {
    database
        .description(service_type)
        .map(str::to_string)
        .unwrap_or_else(|| service_type.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eth0(interface: Interface) -> Option<String> {
        (interface == Interface(3)).then(|| "eth0".to_string())
    }

    #[test]
    fn test_protocol_names() {
        assert_eq!(protocol_name(Protocol::INET), "IPv4");
        assert_eq!(protocol_name(Protocol(1)), "IPv6");
        assert_eq!(protocol_name(Protocol::UNSPEC), "n/a");
        assert_eq!(protocol_name(Protocol(7)), "unk_proto_7");
    }

    #[test]
    fn test_interface_names() {
        assert_eq!(interface_name(Interface(0), Some(&eth0)), "n/a");
        assert_eq!(interface_name(Interface::UNSPEC, None), "n/a");
        assert_eq!(interface_name(Interface(3), Some(&eth0)), "eth0");
        assert_eq!(interface_name(Interface(3), None), "iface_3");
        // Resolver does not know index 9
        assert_eq!(interface_name(Interface(9), Some(&eth0)), "iface_9");
    }

    #[test]
    fn test_wide_area() {
        assert_eq!(
            interface_protocol_name(Interface(-1), Protocol(-1), None),
            "Wide Area"
        );
        assert_eq!(
            interface_protocol_name(Interface(3), Protocol::INET6, Some(&eth0)),
            "eth0 IPv6"
        );
        // Only one wildcard is not wide area
        assert_eq!(
            interface_protocol_name(Interface::UNSPEC, Protocol::INET, None),
            "n/a IPv4"
        );
    }

    #[test]
    fn test_domain_labels() {
        assert_eq!(domain_label(Interface(0), Protocol(0), "local", None), "local");
        assert_eq!(
            domain_label(Interface::UNSPEC, Protocol::UNSPEC, "example.com", None),
            "example.com"
        );
        assert_eq!(
            domain_label(Interface(3), Protocol(0), "local", Some(&eth0)),
            "local on eth0 IPv4"
        );
    }

    #[test]
    fn test_service_type_label_falls_back() {
        let db = ServiceTypeDatabase::empty();
        assert_eq!(service_type_label("_http._tcp", &db), "_http._tcp");

        let db = ServiceTypeDatabase::builtin();
        assert_eq!(service_type_label("_http._tcp", &db), "Web Site");
        assert_eq!(service_type_label("_nope._udp", &db), "_nope._udp");
    }
}
