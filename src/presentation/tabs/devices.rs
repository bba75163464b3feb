use crate::domain::models::BluetoothStatus;
use crate::presentation::app::DeviceListApp;
use crate::presentation::components::Components;
use eframe::egui;

pub fn render(app: &mut DeviceListApp, ui: &mut egui::Ui) {
    Components::heading(ui, "Easy Bluetooth");
    ui.add_space(10.0);

    let (status_text, bg_color, text_color) = match app.console.last_status {
        Some(BluetoothStatus::Connected) => (
            "CONNECTED",
            egui::Color32::from_rgb(0, 170, 80),
            egui::Color32::WHITE,
        ),
        Some(BluetoothStatus::Connecting) => (
            "CONNECTING...",
            egui::Color32::from_rgb(255, 200, 0),
            egui::Color32::BLACK,
        ),
        _ => (
            "NOT CONNECTED",
            egui::Color32::from_gray(110),
            egui::Color32::WHITE,
        ),
    };
    Components::status_banner(ui, status_text, bg_color, text_color);
    ui.add_space(10.0);

    ui.label(format!("Devices found: {}", app.screen.devices().len()));

    let highlighted = app.screen.highlighted_row();
    let mut clicked = None;

    egui::ScrollArea::vertical()
        .id_salt("device_list")
        .auto_shrink([false, true])
        .show(ui, |ui| {
            for (index, device) in app.screen.data_source().rows().iter().enumerate() {
                let row = ui.add_sized(
                    [ui.available_width(), 28.0],
                    egui::SelectableLabel::new(highlighted == Some(index), device.label()),
                );
                if row.clicked() {
                    clicked = Some((device.clone(), index));
                }
            }

            if app.screen.data_source().is_empty() {
                ui.weak("Waiting for nearby devices...");
            }
        });

    if let Some((device, index)) = clicked {
        let command = app.screen.on_device_click(&device, index);
        app.send(command);
    }
}
