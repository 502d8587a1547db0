//! Collapsible domain/type/service tree.

use crate::tree::{NodeId, NodeKind, ServiceTree};
use eframe::egui;
use sdbrowse_core::types::ServiceKey;

/// Shows the tree. Returns the node the user clicked this frame, if any.
pub fn show(
    ui: &mut egui::Ui,
    tree: &mut ServiceTree,
    selected: Option<&ServiceKey>,
) -> Option<NodeKind> {
    if tree.is_empty() {
        ui.weak("Browsing...");
        return None;
    }

    let mut clicked = None;
    let roots = tree.roots().to_vec();
    egui::ScrollArea::vertical().show(ui, |ui| {
        for id in roots {
            show_node(ui, tree, id, selected, &mut clicked);
        }
    });
    clicked
}

fn show_node(
    ui: &mut egui::Ui,
    tree: &mut ServiceTree,
    id: NodeId,
    selected: Option<&ServiceKey>,
    clicked: &mut Option<NodeKind>,
) {
    let Some(node) = tree.node(id) else {
        return;
    };
    let label = node.label.clone();
    let kind = node.kind.clone();
    let children = node.children.clone();

    if let NodeKind::Service(ref key) = kind {
        if ui.selectable_label(selected == Some(key), label.as_str()).clicked() {
            *clicked = Some(kind.clone());
        }
        return;
    }

    let mut header = egui::CollapsingHeader::new(label.as_str()).id_salt(id);
    if tree.take_expand_request(id) {
        header = header.open(Some(true));
    }

    let response = header.show(ui, |ui| {
        for child in children {
            show_node(ui, tree, child, selected, clicked);
        }
    });

    if response.header_response.clicked() {
        *clicked = Some(kind);
    }
}
