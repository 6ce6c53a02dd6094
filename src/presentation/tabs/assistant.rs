use crate::domain::assistant::{self, Condition, Goal, Recommendation};
use crate::presentation::app::MassageApp;
use crate::presentation::components::Components;
use eframe::egui;
use std::time::Instant;

pub fn render(app: &mut MassageApp, ui: &mut egui::Ui) {
    Components::heading(ui, "AI Massage Assistant");
    ui.add_space(16.0);

    if app.active_plan.is_some() {
        ui_active_session(app, ui);
        ui.add_space(12.0);
    }

    ui_profile(app, ui);
    ui.add_space(12.0);

    ui_presets(app, ui);
}

fn ui_active_session(app: &mut MassageApp, ui: &mut egui::Ui) {
    let Some((plan, timer)) = &app.active_plan else {
        return;
    };
    let title = plan.mode.clone();
    let label = timer.label_at(Instant::now());

    let mut stop = false;
    Components::card(ui, "Running Session", |ui| {
        ui.label(egui::RichText::new(title).strong());
        ui.label(egui::RichText::new(label).size(28.0).monospace());
        stop = ui.button("■ Stop Session").clicked();
    });
    if stop {
        app.stop_plan();
    }
}

fn ui_profile(app: &mut MassageApp, ui: &mut egui::Ui) {
    let ready = app.is_ready();
    let mut apply: Option<Recommendation> = None;

    Components::card(ui, "Your Profile", |ui| {
        egui::Grid::new("profile_grid")
            .spacing([20.0, 8.0])
            .show(ui, |ui| {
                ui.label("Age:");
                ui.add(egui::DragValue::new(&mut app.profile.age).range(10..=100));
                ui.end_row();

                ui.label("Weight (kg):");
                ui.add(
                    egui::DragValue::new(&mut app.profile.weight_kg)
                        .range(30.0..=200.0)
                        .speed(0.5),
                );
                ui.end_row();

                ui.label("Height (cm):");
                ui.add(
                    egui::DragValue::new(&mut app.profile.height_cm)
                        .range(100.0..=230.0)
                        .speed(0.5),
                );
                ui.end_row();

                ui.label("Goal:");
                egui::ComboBox::from_id_salt("goal")
                    .selected_text(app.profile.goal.label())
                    .show_ui(ui, |ui| {
                        for goal in Goal::ALL {
                            ui.selectable_value(&mut app.profile.goal, goal, goal.label());
                        }
                    });
                ui.end_row();
            });

        ui.label("Conditions:");
        ui.horizontal_wrapped(|ui| {
            for condition in Condition::ALL {
                let mut checked = app.profile.conditions.contains(&condition);
                if ui.checkbox(&mut checked, condition.label()).changed() {
                    app.profile.toggle(condition);
                }
            }
        });

        if let Some(bmi) = app.profile.bmi() {
            ui.label(format!("BMI: {:.1}", bmi));
        }

        ui.add_space(6.0);
        if ui.button("Get Recommendation").clicked() {
            app.recommendation = Some(assistant::recommend(&app.profile));
        }

        if let Some(recommendation) = &app.recommendation {
            ui.separator();
            ui_plan(ui, recommendation);
            ui.add_space(4.0);
            if ui
                .add_enabled(ready, egui::Button::new("Apply Recommendation"))
                .clicked()
            {
                apply = Some(recommendation.clone());
            }
        }
    });

    if let Some(plan) = apply {
        app.apply_plan(plan);
    }
}

fn ui_presets(app: &mut MassageApp, ui: &mut egui::Ui) {
    let ready = app.is_ready();
    let mut apply: Option<Recommendation> = None;

    Components::card(ui, "Quick Presets", |ui| {
        for preset in assistant::presets() {
            ui.horizontal(|ui| {
                ui_plan(ui, &preset);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.add_enabled(ready, egui::Button::new("Start")).clicked() {
                        apply = Some(preset.clone());
                    }
                });
            });
            ui.separator();
        }
    });

    if let Some(plan) = apply {
        app.apply_plan(plan);
    }
}

fn ui_plan(ui: &mut egui::Ui, plan: &Recommendation) {
    ui.vertical(|ui| {
        ui.label(egui::RichText::new(&plan.mode).strong());
        ui.label(format!(
            "Level {} · {} min · Heat {}",
            plan.level,
            plan.duration_minutes,
            if plan.heat { "on" } else { "off" }
        ));
        if !plan.explanation.is_empty() {
            ui.label(egui::RichText::new(&plan.explanation).size(12.0).weak());
        }
    });
}
