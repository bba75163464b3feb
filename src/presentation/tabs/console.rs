use crate::domain::models::BluetoothCommand;
use crate::presentation::app::DeviceListApp;
use crate::presentation::components::Components;
use eframe::egui;

pub fn render(app: &mut DeviceListApp, ui: &mut egui::Ui) {
    Components::heading(ui, "Bluetooth Console");
    ui.add_space(10.0);

    ui_service_panel(app, ui);
    ui.add_space(10.0);

    ui_adapter_panel(app, ui);
    ui.add_space(10.0);

    ui_data_panel(app, ui);
}

fn ui_service_panel(app: &mut DeviceListApp, ui: &mut egui::Ui) {
    let config = app.settings.get().bluetooth.clone();

    Components::card(ui, "Service", |ui| {
        egui::Grid::new("service_grid")
            .spacing([20.0, 6.0])
            .show(ui, |ui| {
                ui.label("Service UUID:");
                ui.monospace(config.service_uuid.to_string());
                ui.end_row();

                ui.label("Device name:");
                ui.label(&config.device_name);
                ui.end_row();

                ui.label("Buffer size:");
                ui.label(config.buffer_size.get().to_string());
                ui.end_row();

                ui.label("Delimiter:");
                ui.monospace(config.line_delimiter.escape_default().to_string());
                ui.end_row();

                ui.label("Status:");
                ui.label(
                    app.console
                        .last_status
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                );
                ui.end_row();

                ui.label("Connected to:");
                ui.label(app.console.device_name.as_deref().unwrap_or("-"));
                ui.end_row();
            });

        ui.horizontal(|ui| {
            if ui.button("Refresh Status").clicked() {
                app.send(BluetoothCommand::QueryStatus);
            }
            let stop = ui.add_enabled(
                app.console.service_running,
                egui::Button::new("Stop Service"),
            );
            if stop.clicked() {
                app.send(BluetoothCommand::StopService);
            }
        });
    });
}

fn ui_adapter_panel(app: &mut DeviceListApp, ui: &mut egui::Ui) {
    Components::card(ui, "Adapter", |ui| {
        ui.horizontal(|ui| {
            let state = match app.console.adapter_enabled {
                Some(true) => "enabled",
                Some(false) => "disabled",
                None => "unknown",
            };
            ui.label(format!("Adapter: {}", state));

            if ui.button("Check").clicked() {
                app.send(BluetoothCommand::QueryAdapter);
            }
            if app.console.adapter_enabled == Some(false) && ui.button("Enable").clicked() {
                app.send(BluetoothCommand::EnableAdapter);
            }
        });

        ui.horizontal(|ui| {
            ui.label("Bonded devices:");
            if ui.button("Load").clicked() {
                app.send(BluetoothCommand::QueryBondedDevices);
            }
        });
        for device in &app.console.bonded_devices {
            ui.label(device.label());
        }
    });
}

fn ui_data_panel(app: &mut DeviceListApp, ui: &mut egui::Ui) {
    Components::card(ui, "Data", |ui| {
        egui::ScrollArea::vertical()
            .id_salt("received_lines")
            .max_height(180.0)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &app.console.received {
                    ui.monospace(line);
                }
            });

        ui.separator();
        ui.horizontal(|ui| {
            ui.text_edit_singleline(&mut app.write_input);
            if ui.button("Write").clicked() {
                app.send(BluetoothCommand::Write(app.write_input.clone()));
            }
            if ui.button("Writeln").clicked() {
                let text = std::mem::take(&mut app.write_input);
                app.send(BluetoothCommand::Writeln(text));
            }
        });
    });
}
