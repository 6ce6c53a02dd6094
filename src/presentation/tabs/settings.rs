use crate::domain::settings::TransportKind;
use crate::infrastructure::bluetooth::protocol::{ProtocolConfig, ProtocolRevision};
use crate::presentation::app::MassageApp;
use crate::presentation::components::Components;
use eframe::egui;

pub fn render(app: &mut MassageApp, ui: &mut egui::Ui) {
    Components::heading(ui, "Settings");
    ui.add_space(16.0);

    let mut save = false;

    if let Ok(mut settings) = app.settings.lock() {
        let settings_mut = settings.get_mut();

        Components::card(ui, "Device", |ui| {
            ui.horizontal(|ui| {
                ui.label("Transport:");
                egui::ComboBox::from_id_salt("transport")
                    .selected_text(format!("{:?}", settings_mut.device.transport))
                    .show_ui(ui, |ui| {
                        ui.selectable_value(
                            &mut settings_mut.device.transport,
                            TransportKind::Simulated,
                            "Simulated",
                        );
                        ui.selectable_value(
                            &mut settings_mut.device.transport,
                            TransportKind::Ble,
                            "Ble",
                        );
                    });
            });
            if settings_mut.device.transport == TransportKind::Ble && !cfg!(feature = "ble") {
                ui.label(
                    egui::RichText::new("⚠ Built without the `ble` feature; the simulator will be used.")
                        .color(egui::Color32::from_rgb(255, 170, 0)),
                );
            }

            ui.horizontal(|ui| {
                ui.label("Device name:");
                ui.text_edit_singleline(&mut settings_mut.device.name);
            });
            ui.horizontal(|ui| {
                ui.label("Scan timeout (s):");
                ui.add(egui::DragValue::new(&mut settings_mut.device.scan_timeout_secs).range(1..=60));
                ui.label("Connect timeout (s):");
                ui.add(
                    egui::DragValue::new(&mut settings_mut.device.connect_timeout_secs).range(1..=60),
                );
            });

            ui.collapsing("Override Service UUIDs", |ui| {
                ui.label(
                    egui::RichText::new("⚠️ Warning: Altering these may break device discovery.")
                        .color(egui::Color32::from_rgb(255, 200, 0)),
                );

                egui::Grid::new("ble_uuids")
                    .spacing([10.0, 10.0])
                    .show(ui, |ui| {
                        ui.label("Service:");
                        ui.text_edit_singleline(&mut settings_mut.device.service_uuid);
                        ui.end_row();
                        ui.label("Control:");
                        ui.text_edit_singleline(&mut settings_mut.device.control_char_uuid);
                        ui.end_row();
                        ui.label("Notify:");
                        ui.text_edit_singleline(&mut settings_mut.device.notify_char_uuid);
                        ui.end_row();
                    });
            });
        });

        ui.add_space(10.0);

        Components::card(ui, "Protocol", |ui| {
            let mut revision = settings_mut.protocol.revision;
            ui.horizontal(|ui| {
                ui.label("Firmware revision:");
                egui::ComboBox::from_id_salt("protocol_revision")
                    .selected_text(format!("{:?}", revision))
                    .show_ui(ui, |ui| {
                        ui.selectable_value(&mut revision, ProtocolRevision::Tagged, "Tagged");
                        ui.selectable_value(&mut revision, ProtocolRevision::Untagged, "Untagged");
                    });
            });
            if revision != settings_mut.protocol.revision {
                settings_mut.protocol = ProtocolConfig::for_revision(revision);
            }

            let protocol = &settings_mut.protocol;
            ui.label(format!(
                "Level range {}-{} · rotate {:02X} · heat {:02X} · level {:02X} · assistant {:02X}",
                protocol.level_min,
                protocol.level_max,
                protocol.opcodes.rotate,
                protocol.opcodes.heat,
                protocol.opcodes.level,
                protocol.opcodes.assistant,
            ));
        });

        ui.add_space(10.0);

        Components::card(ui, "Logging & Debug", |ui| {
            ui.horizontal(|ui| {
                ui.label("Verbosity Level:");
                egui::ComboBox::from_id_salt("log_level")
                    .selected_text(&settings_mut.log_settings.level)
                    .show_ui(ui, |ui| {
                        for level in &["trace", "debug", "info", "warn", "error"] {
                            ui.selectable_value(
                                &mut settings_mut.log_settings.level,
                                level.to_string(),
                                *level,
                            );
                        }
                    });
            });

            ui.checkbox(
                &mut settings_mut.log_settings.console_logging_enabled,
                "Console Logs",
            );
            ui.checkbox(
                &mut settings_mut.log_settings.file_logging_enabled,
                "File Logs",
            );

            if settings_mut.log_settings.file_logging_enabled {
                ui.indent("file_logs", |ui| {
                    ui.horizontal(|ui| {
                        ui.label("Save Path:");
                        ui.text_edit_singleline(&mut settings_mut.log_settings.log_dir);
                    });
                    ui.horizontal(|ui| {
                        ui.label("Rotation:");
                        egui::ComboBox::from_id_salt("log_rot")
                            .selected_text(&settings_mut.log_settings.rotation)
                            .show_ui(ui, |ui| {
                                for rot in &["daily", "hourly", "never"] {
                                    ui.selectable_value(
                                        &mut settings_mut.log_settings.rotation,
                                        rot.to_string(),
                                        *rot,
                                    );
                                }
                            });
                    });
                });
            }
        });

        ui.add_space(10.0);
        ui.label(
            egui::RichText::new("Most changes apply after a restart.")
                .italics()
                .size(12.0),
        );
        save = ui.button("💾 Save Settings").clicked();
    }

    if save {
        app.save_settings();
    }
}
