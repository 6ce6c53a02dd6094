use eframe::egui;
use massage_companion::presentation::app::MassageApp;

fn main() -> Result<(), eframe::Error> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 700.0])
            .with_title("Massage Companion"),
        ..Default::default()
    };

    eframe::run_native(
        "Massage Companion",
        options,
        Box::new(|cc| Ok(Box::new(MassageApp::new(cc)))),
    )
}
