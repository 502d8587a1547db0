//! Desktop window for the DNS-SD service browser.
//!
//! The window owns the [`Browser`] and registers itself through its hooks;
//! the hooks share the view state with the window through an
//! `Rc<RefCell<..>>`, since everything runs on the UI thread. Each frame
//! drains the discovery source's event channel, feeds browse events to the
//! orchestrator and applies resolve results to the info panel.

use eframe::egui;
use sdbrowse_core::config::BrowserConfig;
use sdbrowse_core::error::BrowseError;
use sdbrowse_core::source::SourceEvent;
use sdbrowse_core::types::{ResolvedService, ServiceKey};
use sdbrowse_core::{BrowseHooks, Browser, ConfigError, ResolveError};
use sdbrowse_mdns::interfaces::system_interface_name;
use sdbrowse_mdns::MdnsSource;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, error, info};

pub mod info;
pub mod tree;
mod ui;

pub use info::{InfoPanel, ServiceDetails, TxtEntry};
pub use tree::{NodeId, NodeKind, ServiceTree, TreeError};

/// Events handled per frame before yielding to rendering.
const MAX_EVENTS_PER_FRAME: usize = 256;

/// Poll interval for discovery events while idle.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Why the window could not be opened.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Browse(#[from] BrowseError),
}

/// State shared between the window and the browse hooks.
pub struct ViewState {
    pub tree: ServiceTree,
    pub info: InfoPanel,
    pub selected: Option<ServiceKey>,
}

impl ViewState {
    pub fn new(tree: ServiceTree) -> Self {
        Self {
            tree,
            info: InfoPanel::default(),
            selected: None,
        }
    }

    /// Drops a service from the tree and from the selection.
    pub fn remove_service(&mut self, key: &ServiceKey) {
        if let Err(e) = self.tree.remove_service(key) {
            error!(error = %e, "Inconsistent removal ignored");
            return;
        }

        if self.selected.as_ref() == Some(key) {
            self.selected = None;
        }
        self.info.clear_if_showing(key);
    }

    /// Shows a resolve result if it is for the current selection.
    pub fn apply_resolved(&mut self, resolved: &ResolvedService, interface: String) {
        info!(
            service = %resolved.key.name,
            service_type = %resolved.key.service_type,
            domain = %resolved.key.domain,
            host = %resolved.host,
            address = %resolved.address,
            port = resolved.port,
            txt = ?resolved.txt,
            "Service resolved"
        );

        if self.selected.as_ref() != Some(&resolved.key) {
            debug!(service = %resolved.key, "Ignoring resolve result for unselected service");
            return;
        }
        self.info = InfoPanel::Resolved(ServiceDetails::new(resolved, interface));
    }

    /// Shows a resolve failure if it is for the current selection.
    pub fn apply_resolve_error(&mut self, err: &ResolveError) {
        error!(error = %err, "Resolve failed");

        if self.selected.as_ref() != Some(&err.key) {
            return;
        }
        self.info = InfoPanel::Error(err.to_string());
    }
}

/// Builds the hooks that keep `view` in sync with the orchestrator.
pub fn view_hooks(view: &Rc<RefCell<ViewState>>) -> BrowseHooks {
    let on_domain = view.clone();
    let on_service = view.clone();
    let on_remove = view.clone();

    BrowseHooks::new()
        .on_new_domain(move |key, _flags| on_domain.borrow_mut().tree.add_domain(key))
        .on_new_service_type(|key, _flags| {
            // Type nodes appear with their first service
            debug!(service_type = %key.service_type, domain = %key.domain, "Service type seen");
        })
        .on_new_service(move |key, _flags| {
            on_service.borrow_mut().tree.add_service(key);
        })
        .on_remove_service(move |key, _flags| on_remove.borrow_mut().remove_service(key))
}

/// Main window of the service browser.
pub struct DiscoverApp {
    browser: Browser<MdnsSource>,
    view: Rc<RefCell<ViewState>>,
}

impl DiscoverApp {
    /// Connects to the mDNS daemon and starts browsing.
    ///
    /// # Errors
    ///
    /// Fails if the service type table cannot be loaded or the daemon
    /// cannot be started. Both happen before any window exists.
    pub fn start(config: &BrowserConfig) -> Result<Self, StartupError> {
        let service_types = config.service_type_database()?;
        let tree = ServiceTree::new(service_types, Box::new(system_interface_name));
        let view = Rc::new(RefCell::new(ViewState::new(tree)));

        let browser = Browser::start(
            || MdnsSource::connect(&config.mdns),
            view_hooks(&view),
            &config.browse,
        )?;

        Ok(Self { browser, view })
    }

    fn process_events(&mut self) {
        for _ in 0..MAX_EVENTS_PER_FRAME {
            let Some(event) = self.browser.source().try_next_event() else {
                break;
            };

            match event {
                SourceEvent::Browse(event) => self.browser.dispatch(event),
                SourceEvent::Resolve(Ok(resolved)) => {
                    let interface = self.browser.interface_protocol_label(&resolved.key);
                    self.view.borrow_mut().apply_resolved(&resolved, interface);
                }
                SourceEvent::Resolve(Err(e)) => self.view.borrow_mut().apply_resolve_error(&e),
            }
        }
    }

    fn select(&mut self, kind: NodeKind) {
        let NodeKind::Service(key) = kind else {
            let mut view = self.view.borrow_mut();
            view.selected = None;
            view.info = InfoPanel::NoSelection;
            return;
        };

        {
            let mut view = self.view.borrow_mut();
            view.selected = Some(key.clone());
            view.info = InfoPanel::Resolving(key.clone());
        }

        if let Err(e) = self.browser.resolve_service(&key) {
            error!(service = %key, error = %e, "Failed to request resolution");
            self.view.borrow_mut().info = InfoPanel::Error(e.to_string());
        }
    }
}

impl eframe::App for DiscoverApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_events();

        egui::SidePanel::right("info_panel")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| {
                ui.heading("Service");
                ui.separator();
                ui::info_panel::show(ui, &self.view.borrow().info);
            });

        let clicked = egui::CentralPanel::default()
            .show(ctx, |ui| {
                let mut view = self.view.borrow_mut();
                let view = &mut *view;
                ui::tree_view::show(ui, &mut view.tree, view.selected.as_ref())
            })
            .inner;

        if let Some(kind) = clicked {
            self.select(kind);
        }

        ctx.request_repaint_after(POLL_INTERVAL);
    }
}
