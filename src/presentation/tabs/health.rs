use crate::domain::models::HealthSample;
use crate::presentation::app::MassageApp;
use crate::presentation::components::Components;
use crate::presentation::theme::Palette;
use crate::presentation::waveform_view;
use eframe::egui;

pub fn render(app: &mut MassageApp, ui: &mut egui::Ui) {
    Components::heading(ui, "Health Monitor");
    ui.add_space(16.0);

    let sample = app.health.unwrap_or_default();

    Components::card(ui, "Vitals", |ui| {
        ui.columns(2, |columns| {
            Components::metric(
                &mut columns[0],
                &sample.heart_rate_label(),
                "Heart rate",
                egui::Color32::from_rgb(230, 60, 80),
            );
            Components::metric(
                &mut columns[1],
                &sample.spo2_label(),
                "Blood oxygen (SpO2)",
                egui::Color32::from_rgb(40, 120, 230),
            );
        });
        if sample == HealthSample::default() {
            ui.label(
                egui::RichText::new("Place a finger on the sensor to get a reading.")
                    .italics()
                    .size(12.0),
            );
        }
    });

    ui.add_space(12.0);

    Components::card(ui, "Pulse Waveform", |ui| {
        let palette = Palette::new(app.is_dark_mode);
        waveform_view::show(ui, &app.waveform, &palette, 220.0);

        ui.horizontal(|ui| {
            if let Some(amplification) = waveform_view::amplification_slider(ui, &app.waveform) {
                if let Ok(mut settings) = app.settings.lock() {
                    settings.get_mut().waveform.amplification = amplification;
                }
            }
            if ui.button("Clear").clicked() {
                app.clear_waveform();
            }
        });
        ui.label(format!("{} samples buffered", app.waveform.len()));
    });
}
