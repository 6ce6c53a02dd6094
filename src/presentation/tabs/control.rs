use crate::domain::models::{ConnectionStatus, DeviceCommand};
use crate::presentation::app::MassageApp;
use crate::presentation::components::Components;
use crate::presentation::theme;
use eframe::egui;

pub fn render(app: &mut MassageApp, ui: &mut egui::Ui) {
    Components::heading(ui, "Massage Control");
    ui.add_space(16.0);

    ui_connection_panel(app, ui);
    ui.add_space(12.0);

    ui_status_panel(app, ui);
    ui.add_space(12.0);

    ui_device_panel(app, ui);
}

fn ui_connection_panel(app: &mut MassageApp, ui: &mut egui::Ui) {
    Components::card(ui, "Connection", |ui| {
        let (status_text, bg_color, text_color) = theme::status_colors(app.connection_status);
        Components::status_banner(ui, status_text, bg_color, text_color);

        ui.add_space(8.0);

        ui.horizontal(|ui| {
            match app.connection_status {
                ConnectionStatus::Disconnected | ConnectionStatus::Error => {
                    if ui.button("Connect").clicked() {
                        app.connect();
                    }
                }
                ConnectionStatus::Connecting | ConnectionStatus::Connected => {
                    ui.spinner();
                    if ui.button("Cancel").clicked() {
                        app.disconnect();
                    }
                }
                ConnectionStatus::Ready => {
                    if ui.button("Disconnect").clicked() {
                        app.disconnect();
                    }
                }
            }

            ui.checkbox(&mut app.reconnect.enabled, "Reconnect automatically");
        });

        if let Some(at) = app.reconnect.timer {
            let secs = at.saturating_duration_since(std::time::Instant::now());
            ui.label(format!("Reconnecting in {:.1} s", secs.as_secs_f32()));
        }
    });
}

fn ui_status_panel(app: &MassageApp, ui: &mut egui::Ui) {
    if let Some(msg) = &app.status_message {
        Components::card(ui, "Status", |ui| {
            ui.label(
                egui::RichText::new(&msg.message)
                    .color(theme::severity_color(msg.severity))
                    .strong(),
            );
        });
    }
}

fn ui_device_panel(app: &mut MassageApp, ui: &mut egui::Ui) {
    let ready = app.is_ready();

    Components::card(ui, "Device", |ui| {
        if !ready {
            ui.label(egui::RichText::new("Connect to the device to use the controls.").italics());
        }

        ui.add_enabled_ui(ready, |ui| {
            ui.horizontal(|ui| {
                if ui.button("⟲ Reverse Rotation").clicked() {
                    app.send(DeviceCommand::Rotate);
                }
                if ui.button("🔥 Toggle Heat").clicked() {
                    app.send(DeviceCommand::ToggleHeat);
                }
                if ui.button("Assistant").clicked() {
                    app.send(DeviceCommand::Assistant);
                }
            });

            ui.separator();
            Components::sub_heading(ui, "Intensity");

            let response = ui.add(
                egui::Slider::new(&mut app.level, 0..=app.level_max as i32).text("Level"),
            );
            // Only send once the user lets go of the slider
            if response.drag_stopped() || (response.changed() && !response.dragged()) {
                app.send(DeviceCommand::SetLevel(app.level));
            }
        });
    });
}
