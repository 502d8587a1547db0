//! Details of the selected service.

use crate::info::{InfoPanel, NO_SELECTION};
use eframe::egui;

pub fn show(ui: &mut egui::Ui, info: &InfoPanel) {
    match info {
        InfoPanel::NoSelection => {
            ui.label(egui::RichText::new(NO_SELECTION).italics());
        }

        InfoPanel::Resolving(key) => {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label(format!("Resolving '{}'...", key.name));
            });
        }

        InfoPanel::Resolved(details) => {
            egui::Grid::new("service_details_grid")
                .num_columns(2)
                .spacing([12.0, 4.0])
                .show(ui, |ui| {
                    for (label, value) in details.rows() {
                        ui.strong(label);
                        ui.label(value);
                        ui.end_row();
                    }
                });

            ui.add_space(6.0);
            ui.weak(format!(
                "Resolved at {}",
                details.resolved_at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
        }

        InfoPanel::Error(message) => {
            ui.horizontal_wrapped(|ui| {
                ui.strong("Error:");
                ui.colored_label(egui::Color32::RED, message);
            });
        }

        InfoPanel::Cleared => {}
    }
}
