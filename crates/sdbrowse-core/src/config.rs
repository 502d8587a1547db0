//! Configuration for the service browser.
//!
//! Sources, lowest precedence first:
//! - built-in defaults (browse `local` and every advertised domain)
//! - an optional YAML file
//! - `SDBROWSE__<SECTION>__<FIELD>` environment variables
//!
//! The command line (`--domain`) is merged on top by the binary.

use crate::error::ConfigError;
use crate::service_db::ServiceTypeDatabase;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Level;

/// Root configuration.
///
/// # Examples
///
/// ```
/// use sdbrowse_core::config::BrowserConfig;
///
/// let config = BrowserConfig::from_yaml("browse:\n  domains: [example.com]\n").unwrap();
/// assert!(config.browse.browse_local);
/// assert_eq!(config.browse.domains, vec!["example.com".to_string()]);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Which domains to seed the browser with
    #[serde(default)]
    pub browse: BrowseOptions,

    /// Service type description table
    #[serde(default)]
    pub service_types: ServiceTypesConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// mDNS backend configuration
    #[serde(default)]
    pub mdns: MdnsConfig,
}

impl BrowserConfig {
    /// Loads configuration from an optional YAML file plus environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the merged result does
    /// not deserialize.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(true),
            );
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("SDBROWSE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("browse.domains")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::LoadFailed {
                path: path
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<environment>".to_string()),
                reason: e.to_string(),
            })?;

        config
            .try_deserialize()
            .map_err(|e| ConfigError::InvalidFormat {
                reason: e.to_string(),
            })
    }

    /// Parses configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::InvalidFormat {
            reason: e.to_string(),
        })
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.browse.validate()?;
        self.logging.parse_level()?;
        self.mdns.validate()?;
        Ok(())
    }

    /// Builds the service type table: built-in entries, overridden by the
    /// configured file if any.
    pub fn service_type_database(&self) -> Result<ServiceTypeDatabase, ConfigError> {
        let mut db = ServiceTypeDatabase::builtin();
        if let Some(ref file) = self.service_types.file {
            db.extend(ServiceTypeDatabase::from_file(
                file,
                self.service_types.locale.as_deref(),
            )?);
        }
        Ok(db)
    }
}

/// Initial domain subscriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowseOptions {
    /// Browse the `local` multicast domain
    #[serde(default = "default_true")]
    pub browse_local: bool,

    /// Browse every domain the network advertises as browsable
    #[serde(default = "default_true")]
    pub browse_all_domains: bool,

    /// Extra domains to browse
    #[serde(default)]
    pub domains: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for BrowseOptions {
    fn default() -> Self {
        Self {
            browse_local: true,
            browse_all_domains: true,
            domains: Vec::new(),
        }
    }
}

impl BrowseOptions {
    /// Adds a domain from the command line, ignoring duplicates.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        let domain = normalize_domain(&domain.into());
        if !self.domains.iter().any(|d| normalize_domain(d) == domain) {
            self.domains.push(domain);
        }
        self
    }

    /// Extra domains without surrounding whitespace or the trailing root dot.
    pub fn normalized_domains(&self) -> Vec<String> {
        self.domains.iter().map(|d| normalize_domain(d)).collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for domain in &self.domains {
            if normalize_domain(domain).is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "browse.domains".to_string(),
                    reason: format!("'{}' is not a domain name", domain),
                });
            }
        }
        Ok(())
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_string()
}

/// Where service type descriptions come from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceTypesConfig {
    /// Description file in `type:Description` format, merged over the
    /// built-in table
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Locale used to pick translated descriptions (e.g. `de_DE`)
    #[serde(default)]
    pub locale: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "text" or "json"
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    /// Parses the log level string to a tracing Level.
    pub fn parse_level(&self) -> Result<Level, ConfigError> {
        self.level.parse().map_err(|_| ConfigError::InvalidValue {
            field: "logging.level".to_string(),
            reason: format!("Invalid log level: {}", self.level),
        })
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Configuration for the discovery backend: multicast DNS for `local`,
/// unicast DNS for other domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MdnsConfig {
    /// Events buffered between the daemon and the UI thread
    #[serde(default = "default_event_capacity")]
    pub event_channel_capacity: usize,

    /// Worker threads for the backend runtime
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Seconds between unicast DNS-SD polls of a non-local domain
    #[serde(default = "default_unicast_poll_secs")]
    pub unicast_poll_secs: u64,
}

fn default_event_capacity() -> usize {
    1000
}

fn default_worker_threads() -> usize {
    1
}

fn default_unicast_poll_secs() -> u64 {
    30
}

impl Default for MdnsConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_capacity(),
            worker_threads: default_worker_threads(),
            unicast_poll_secs: default_unicast_poll_secs(),
        }
    }
}

impl MdnsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "mdns.event_channel_capacity".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.worker_threads == 0 {
            return Err(ConfigError::InvalidValue {
                field: "mdns.worker_threads".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.unicast_poll_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "mdns.unicast_poll_secs".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}
