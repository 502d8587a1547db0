//! mDNS discovery source for the service browser.
//!
//! Implements [`sdbrowse_core::DiscoverySource`] on top of the `mdns-sd`
//! crate:
//! - domain browsing uses DNS-SD browse-domain enumeration
//!   (`b._dns-sd._udp.local.`)
//! - service-type browsing uses the DNS-SD meta-query
//!   (`_services._dns-sd._udp.local.`)
//! - instance browsing and resolution use regular service browses
//!
//! `local` goes through the multicast daemon. Other domains are browsed
//! with the same DNS-SD names over unicast DNS (`hickory-resolver`), polled
//! on an interval. Events are delivered on a bounded channel that the UI
//! thread drains with [`MdnsSource::try_next_event`].
//!
//! # Example
//!
//! ```no_run
//! use sdbrowse_core::{BrowseHooks, BrowseOptions, Browser, SourceEvent};
//! use sdbrowse_mdns::{MdnsConfig, MdnsSource};
//!
//! let config = MdnsConfig::default();
//! let mut browser = Browser::start(
//!     || MdnsSource::connect(&config),
//!     BrowseHooks::new(),
//!     &BrowseOptions::default(),
//! )?;
//!
//! while let Some(event) = browser.source().try_next_event() {
//!     if let SourceEvent::Browse(event) = event {
//!         browser.dispatch(event);
//!     }
//! }
//! # Ok::<(), sdbrowse_core::BrowseError>(())
//! ```

pub mod dnssd;
pub mod interfaces;
mod router;
pub mod source;
mod unicast;

pub use sdbrowse_core::config::MdnsConfig;
pub use source::{MdnsSource, MdnsSubscription};
