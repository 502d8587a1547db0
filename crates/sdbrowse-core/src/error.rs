//! Error types for the service browser.
//!
//! Only [`DiscoveryError::Connection`] is fatal. Resolve failures are shown in
//! the info panel, and inconsistent removals are logged and dropped by the
//! presentation layer.

use crate::types::ServiceKey;
use thiserror::Error;

/// Top-level error type for browser startup.
#[derive(Debug, Error)]
pub enum BrowseError {
    /// Discovery daemon errors
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),
}

impl BrowseError {
    /// Returns true if the session cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BrowseError::Discovery(DiscoveryError::Connection(_)))
    }
}

/// Errors raised by a discovery backend.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The discovery daemon could not be reached
    #[error("Failed to connect to the discovery daemon (is it running?): {0}")]
    Connection(String),

    /// A browse request was rejected
    #[error("Failed to browse '{browse_type}': {reason}")]
    BrowseFailed { browse_type: String, reason: String },

    /// The backend cannot reach this scope
    #[error("Cannot browse domain '{domain}': {reason}")]
    UnsupportedScope { domain: String, reason: String },

    /// A resolve request could not be issued
    #[error("Failed to request resolution of '{service}': {reason}")]
    ResolveRequestFailed { service: String, reason: String },
}

/// A resolve request that failed after it was issued.
#[derive(Debug, Clone, Error)]
#[error("Failed to resolve '{key}': {reason}")]
pub struct ResolveError {
    pub key: ServiceKey,
    pub reason: String,
}

impl ResolveError {
    pub fn new(key: ServiceKey, reason: impl Into<String>) -> Self {
        Self {
            key,
            reason: reason.into(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to load a configuration or data file
    #[error("Failed to load '{path}': {reason}")]
    LoadFailed { path: String, reason: String },

    /// The configuration could not be deserialized
    #[error("Invalid configuration format: {reason}")]
    InvalidFormat { reason: String },

    /// A field holds an unusable value
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Interface, Protocol};

    #[test]
    fn test_only_connection_errors_are_fatal() {
        let fatal: BrowseError = DiscoveryError::Connection("no daemon".into()).into();
        assert!(fatal.is_fatal());

        let browse: BrowseError = DiscoveryError::BrowseFailed {
            browse_type: "_http._tcp.local.".into(),
            reason: "bad".into(),
        }
        .into();
        assert!(!browse.is_fatal());
    }

    #[test]
    fn test_resolve_error_display() {
        let key = ServiceKey::new(Interface::UNSPEC, Protocol::UNSPEC, "Web", "_http._tcp", "local");
        let err = ResolveError::new(key, "timed out");
        assert_eq!(err.to_string(), "Failed to resolve 'Web._http._tcp.local': timed out");
    }
}
