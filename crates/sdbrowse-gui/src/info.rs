//! Contents of the service details panel.

use chrono::{DateTime, Utc};
use sdbrowse_core::types::{ResolvedService, ServiceKey};

pub const NO_SELECTION: &str = "No service currently selected.";

/// One TXT record string, split at its first `=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxtEntry {
    pub key: String,
    pub value: Option<String>,
}

impl TxtEntry {
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('=') {
            Some((key, value)) => Self {
                key: key.to_string(),
                value: Some(value.to_string()),
            },
            None => Self {
                key: raw.to_string(),
                value: None,
            },
        }
    }
}

/// Everything shown for a resolved service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDetails {
    pub key: ServiceKey,
    pub interface: String,
    pub host: String,
    pub address: String,
    pub port: u16,
    pub txt: Vec<TxtEntry>,
    pub resolved_at: DateTime<Utc>,
}

impl ServiceDetails {
    /// `interface` is the human label of the key's interface/protocol pair.
    pub fn new(resolved: &ResolvedService, interface: String) -> Self {
        Self {
            key: resolved.key.clone(),
            interface,
            host: resolved.host.clone(),
            address: resolved.address.to_string(),
            port: resolved.port,
            txt: resolved.txt.iter().map(|raw| TxtEntry::parse(raw)).collect(),
            resolved_at: resolved.resolved_at,
        }
    }

    /// `(label, value)` rows in display order.
    pub fn rows(&self) -> Vec<(String, String)> {
        let mut rows = vec![
            ("Service Type:".to_string(), self.key.service_type.clone()),
            ("Service Name:".to_string(), self.key.name.clone()),
            ("Domain Name:".to_string(), self.key.domain.clone()),
            ("Interface:".to_string(), self.interface.clone()),
            (
                "Address:".to_string(),
                format!("{} / {} port {}", self.host, self.address, self.port),
            ),
        ];

        if self.txt.is_empty() {
            rows.push(("TXT Data:".to_string(), "empty".to_string()));
        }
        for entry in &self.txt {
            let value = match &entry.value {
                Some(value) => format!("= {}", value),
                None => String::new(),
            };
            rows.push((format!("TXT {}", entry.key), value));
        }
        rows
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum InfoPanel {
    #[default]
    NoSelection,
    Resolving(ServiceKey),
    Resolved(ServiceDetails),
    Error(String),
    /// The displayed service went away
    Cleared,
}

impl InfoPanel {
    /// Service the panel is about, if any.
    pub fn subject(&self) -> Option<&ServiceKey> {
        match self {
            InfoPanel::Resolving(key) => Some(key),
            InfoPanel::Resolved(details) => Some(&details.key),
            _ => None,
        }
    }

    /// Clears the panel if it shows `key`. Returns true if it did.
    pub fn clear_if_showing(&mut self, key: &ServiceKey) -> bool {
        if self.subject() == Some(key) {
            *self = InfoPanel::Cleared;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdbrowse_core::types::{Interface, Protocol};

    fn web() -> ServiceKey {
        ServiceKey::new(Interface::UNSPEC, Protocol::UNSPEC, "Web", "_http._tcp", "local")
    }

    fn resolved(txt: &[&str]) -> ResolvedService {
        ResolvedService {
            key: web(),
            host: "web.local".to_string(),
            protocol: Protocol::INET,
            address: "192.168.1.20".parse().unwrap(),
            port: 8080,
            txt: txt.iter().map(|s| s.to_string()).collect(),
            resolved_at: Utc::now(),
        }
    }

    #[test]
    fn test_txt_split_at_first_equals() {
        assert_eq!(
            TxtEntry::parse("path=/a=b"),
            TxtEntry {
                key: "path".to_string(),
                value: Some("/a=b".to_string())
            }
        );
        assert_eq!(TxtEntry::parse("flag").value, None);
        assert_eq!(TxtEntry::parse("empty=").value, Some(String::new()));
    }

    #[test]
    fn test_rows() {
        let details = ServiceDetails::new(&resolved(&["path=/admin", "secure"]), "Wide Area".into());
        let rows = details.rows();

        assert_eq!(rows[0], ("Service Type:".to_string(), "_http._tcp".to_string()));
        assert_eq!(rows[3], ("Interface:".to_string(), "Wide Area".to_string()));
        assert_eq!(
            rows[4],
            (
                "Address:".to_string(),
                "web.local / 192.168.1.20 port 8080".to_string()
            )
        );
        assert_eq!(rows[5], ("TXT path".to_string(), "= /admin".to_string()));
        assert_eq!(rows[6], ("TXT secure".to_string(), String::new()));
    }

    #[test]
    fn test_empty_txt() {
        let details = ServiceDetails::new(&resolved(&[]), "Wide Area".into());
        let rows = details.rows();
        assert_eq!(
            rows.last(),
            Some(&("TXT Data:".to_string(), "empty".to_string()))
        );
    }

    #[test]
    fn test_clear_only_for_displayed_service() {
        let mut panel = InfoPanel::Resolving(web());
        let other = ServiceKey::new(Interface::UNSPEC, Protocol::UNSPEC, "Other", "_http._tcp", "local");

        assert!(!panel.clear_if_showing(&other));
        assert_eq!(panel, InfoPanel::Resolving(web()));

        assert!(panel.clear_if_showing(&web()));
        assert_eq!(panel, InfoPanel::Cleared);
    }
}
