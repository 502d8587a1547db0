//! # sdbrowse core
//!
//! Domain model and browse orchestration for the DNS-SD service browser.
//!
//! - **Types**: identity keys for domains, service types and service
//!   instances, plus the interface/protocol sentinels used by the discovery
//!   daemon.
//! - **Naming**: pure functions turning those keys into human-readable labels.
//! - **Service types**: the description table used to label raw DNS-SD types.
//! - **Source**: the contract a discovery backend implements.
//! - **Browser**: the orchestrator that deduplicates browse requests and
//!   cascades subscriptions from domains to service types to instances.
//! - **Errors / Configuration**: `thiserror` taxonomy and the YAML/env config.
//!
//! ## Example
//!
//! ```
//! use sdbrowse_core::naming::domain_label;
//! use sdbrowse_core::types::{Interface, Protocol};
//!
//! assert_eq!(domain_label(Interface(0), Protocol(0), "local", None), "local");
//! ```

pub mod browser;
pub mod config;
pub mod error;
pub mod naming;
pub mod service_db;
pub mod source;
pub mod types;

pub use browser::{BrowseHooks, Browser};
pub use config::{BrowseOptions, BrowserConfig, LogFormat, LoggingConfig};
pub use error::{BrowseError, ConfigError, DiscoveryError, ResolveError};
pub use service_db::ServiceTypeDatabase;
pub use source::{BrowseEvent, DiscoverySource, InterfaceNames, SourceEvent};
pub use types::{
    DomainKey, Interface, LookupFlags, Protocol, ResolvedService, ServiceKey, ServiceTypeKey,
};
