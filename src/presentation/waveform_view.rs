//! PPG waveform plot
//!
//! Draws whatever [`WaveformBuffer::render`] returns onto an egui painter,
//! on top of a reference grid.

use crate::domain::waveform::{WaveformBuffer, MAX_AMPLIFICATION, MIN_AMPLIFICATION};
use crate::presentation::theme::Palette;
use eframe::egui::{self, pos2, Align2, FontId, Pos2, Rect, Shape, Stroke};

const HORIZONTAL_DIVISIONS: usize = 8;
const VERTICAL_DIVISIONS: usize = 10;

/// Reference grid as line segments in plot coordinates, centre line last
pub fn grid_lines(width: f32, height: f32) -> Vec<[(f32, f32); 2]> {
    let horizontal = (0..=HORIZONTAL_DIVISIONS).map(|i| {
        let y = height * i as f32 / HORIZONTAL_DIVISIONS as f32;
        [(0.0, y), (width, y)]
    });
    let vertical = (0..=VERTICAL_DIVISIONS).map(|i| {
        let x = width * i as f32 / VERTICAL_DIVISIONS as f32;
        [(x, 0.0), (x, height)]
    });
    let center = std::iter::once([(0.0, height / 2.0), (width, height / 2.0)]);
    horizontal.chain(vertical).chain(center).collect()
}

fn to_screen(rect: Rect, (x, y): (f32, f32)) -> Pos2 {
    pos2(rect.left() + x, rect.top() + y)
}

/// Paint the plot into a region `height` points tall
pub fn show(ui: &mut egui::Ui, waveform: &WaveformBuffer, palette: &Palette, height: f32) {
    let (rect, _) = ui.allocate_exact_size(
        egui::vec2(ui.available_width(), height),
        egui::Sense::hover(),
    );
    let painter = ui.painter_at(rect);
    painter.rect_filled(rect, 0.0, palette.plot_bg);

    let lines = grid_lines(rect.width(), rect.height());
    let last = lines.len() - 1;
    for (i, [a, b]) in lines.into_iter().enumerate() {
        let color = if i == last {
            palette.plot_center
        } else {
            palette.plot_grid
        };
        painter.line_segment(
            [to_screen(rect, a), to_screen(rect, b)],
            Stroke::new(1.0, color),
        );
    }

    let frame = waveform.render(rect.width(), rect.height());
    if frame.points.len() >= 2 {
        let points = frame.points.iter().map(|&p| to_screen(rect, p)).collect();
        painter.add(Shape::line(points, Stroke::new(2.0, palette.plot_trace)));
    }

    let font = FontId::proportional(13.0);
    let range = frame.range.map_or(0, |r| r as i64);
    painter.text(
        rect.left_top() + egui::vec2(8.0, 6.0),
        Align2::LEFT_TOP,
        format!("Range: {}", range),
        font.clone(),
        palette.plot_text,
    );
    painter.text(
        rect.left_top() + egui::vec2(8.0, 24.0),
        Align2::LEFT_TOP,
        format!("Amp: {:.1}x", frame.amplification),
        font,
        palette.plot_text,
    );
}

/// Slider bound to the buffer's amplification; returns the new value when changed
pub fn amplification_slider(ui: &mut egui::Ui, waveform: &WaveformBuffer) -> Option<f32> {
    let mut amplification = waveform.amplification();
    let response = ui.add(
        egui::Slider::new(&mut amplification, MIN_AMPLIFICATION..=MAX_AMPLIFICATION)
            .text("Amplification")
            .suffix("x"),
    );
    if response.changed() {
        waveform.set_amplification(amplification);
        return Some(waveform.amplification());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_has_nine_horizontal_eleven_vertical_and_center() {
        let lines = grid_lines(300.0, 160.0);
        assert_eq!(lines.len(), 9 + 11 + 1);

        let horizontal = lines.iter().filter(|[a, b]| a.1 == b.1).count();
        let vertical = lines.iter().filter(|[a, b]| a.0 == b.0).count();
        assert_eq!(horizontal, 10);
        assert_eq!(vertical, 11);

        assert_eq!(lines[0], [(0.0, 0.0), (300.0, 0.0)]);
        assert_eq!(lines[8], [(0.0, 160.0), (300.0, 160.0)]);
        assert_eq!(*lines.last().unwrap(), [(0.0, 80.0), (300.0, 80.0)]);
    }
}
