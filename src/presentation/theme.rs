use crate::domain::models::{ConnectionStatus, MessageSeverity};
use eframe::egui::{self, Color32, Stroke};

pub struct Palette {
    pub bg: Color32,
    pub fg: Color32,
    pub stroke: Color32,
    pub accent: Color32,
    pub pressed: Color32,
    pub selection: Color32,
    /// Background of the waveform plot
    pub plot_bg: Color32,
    pub plot_grid: Color32,
    pub plot_center: Color32,
    pub plot_trace: Color32,
    pub plot_text: Color32,
}

impl Palette {
    pub fn new(is_dark: bool) -> Self {
        if is_dark {
            Self {
                bg: Color32::from_rgb(24, 26, 30),
                fg: Color32::WHITE,
                stroke: Color32::WHITE,
                accent: Color32::from_rgb(255, 170, 90),
                pressed: Color32::from_rgb(120, 220, 160),
                selection: Color32::from_rgb(90, 200, 230),
                plot_bg: Color32::BLACK,
                plot_grid: Color32::from_white_alpha(50),
                plot_center: Color32::from_white_alpha(100),
                plot_trace: Color32::from_rgb(0, 255, 0),
                plot_text: Color32::from_white_alpha(150),
            }
        } else {
            Self {
                bg: Color32::from_rgb(250, 246, 240),
                fg: Color32::BLACK,
                stroke: Color32::BLACK,
                accent: Color32::from_rgb(255, 190, 120),
                pressed: Color32::from_rgb(140, 230, 170),
                selection: Color32::from_rgb(120, 210, 240),
                plot_bg: Color32::BLACK,
                plot_grid: Color32::from_white_alpha(50),
                plot_center: Color32::from_white_alpha(100),
                plot_trace: Color32::from_rgb(0, 255, 0),
                plot_text: Color32::from_white_alpha(150),
            }
        }
    }
}

/// Banner text and colors for a connection state
pub fn status_colors(status: ConnectionStatus) -> (&'static str, Color32, Color32) {
    match status {
        ConnectionStatus::Ready => ("READY", Color32::from_rgb(0, 200, 0), Color32::BLACK),
        ConnectionStatus::Connected => (
            "DISCOVERING SERVICES...",
            Color32::from_rgb(120, 200, 255),
            Color32::BLACK,
        ),
        ConnectionStatus::Connecting => (
            "CONNECTING...",
            Color32::from_rgb(255, 200, 0),
            Color32::BLACK,
        ),
        ConnectionStatus::Disconnected => {
            ("DISCONNECTED", Color32::from_gray(100), Color32::WHITE)
        }
        ConnectionStatus::Error => ("ERROR", Color32::from_rgb(255, 50, 50), Color32::WHITE),
    }
}

pub fn severity_color(severity: MessageSeverity) -> Color32 {
    match severity {
        MessageSeverity::Info => Color32::from_rgb(40, 90, 220),
        MessageSeverity::Success => Color32::from_rgb(0, 150, 0),
        MessageSeverity::Warning => Color32::from_rgb(200, 150, 0),
        MessageSeverity::Error => Color32::RED,
    }
}

pub fn configure(ctx: &egui::Context, is_dark: bool) {
    let mut style = (*ctx.style()).clone();
    let palette = Palette::new(is_dark);

    style
        .text_styles
        .iter_mut()
        .for_each(|(text_style, font_id)| {
            font_id.size = match text_style {
                egui::TextStyle::Heading => 26.0,
                egui::TextStyle::Body | egui::TextStyle::Button => 15.0,
                _ => font_id.size,
            };
        });

    style.spacing.item_spacing = egui::vec2(10.0, 10.0);
    style.spacing.button_padding = egui::vec2(14.0, 8.0);
    style.spacing.slider_width = 220.0;

    let widgets = &mut style.visuals.widgets;
    widgets.noninteractive.bg_stroke = Stroke::new(2.0, palette.stroke);
    widgets.noninteractive.fg_stroke = Stroke::new(1.0, palette.fg);
    widgets.noninteractive.bg_fill = palette.bg;

    widgets.inactive.bg_stroke = Stroke::new(2.0, palette.stroke);
    widgets.inactive.fg_stroke = Stroke::new(1.0, palette.fg);
    widgets.inactive.bg_fill = if is_dark {
        Color32::from_gray(36)
    } else {
        Color32::WHITE
    };

    widgets.hovered.bg_stroke = Stroke::new(2.5, palette.stroke);
    widgets.hovered.bg_fill = palette.accent;
    widgets.hovered.fg_stroke = Stroke::new(1.0, Color32::BLACK);

    widgets.active.bg_stroke = Stroke::new(3.0, palette.stroke);
    widgets.active.bg_fill = palette.pressed;
    widgets.active.fg_stroke = Stroke::new(1.0, Color32::BLACK);

    for visuals in [
        &mut widgets.noninteractive,
        &mut widgets.inactive,
        &mut widgets.hovered,
        &mut widgets.active,
    ] {
        visuals.rounding = egui::Rounding::same(4.0);
    }

    style.visuals.selection.stroke = Stroke::new(1.0, palette.stroke);
    style.visuals.selection.bg_fill = palette.selection;
    style.visuals.window_stroke = Stroke::new(2.0, palette.stroke);
    style.visuals.window_fill = palette.bg;
    style.visuals.panel_fill = palette.bg;
    style.visuals.override_text_color = Some(palette.fg);

    ctx.set_style(style);
}
