mod domain;
mod infrastructure;
mod presentation;

use eframe::egui;
use presentation::app::DeviceListApp;

type AppResult = Result<Box<dyn eframe::App>, Box<dyn std::error::Error + Send + Sync>>;

fn create_app(cc: &eframe::CreationContext<'_>) -> AppResult {
    let app = DeviceListApp::new(cc)?;
    Ok(Box::new(app))
}

fn main() -> Result<(), eframe::Error> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([480.0, 640.0])
            .with_title("Easy Bluetooth Example"),
        ..Default::default()
    };

    eframe::run_native(
        "Easy Bluetooth Example",
        options,
        Box::new(|cc| create_app(cc)),
    )
}
