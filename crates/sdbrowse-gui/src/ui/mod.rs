//! UI panels for the service browser window.

pub mod info_panel;
pub mod tree_view;
