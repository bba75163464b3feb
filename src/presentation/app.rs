use crate::domain::models::{AppEvent, BluetoothCommand, Tab};
use crate::domain::settings::SettingsService;
use crate::infrastructure::bluetooth::create_service;
use crate::infrastructure::logging::{init_logger, LoggingGuard};
use crate::presentation::console_state::ConsoleState;
use crate::presentation::screen::DeviceListScreen;
use crate::presentation::worker::{BluetoothWorker, EventSink};
use eframe::egui;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub struct DeviceListApp {
    // Services
    pub(crate) settings: SettingsService,
    pub(crate) worker: BluetoothWorker,
    pub(crate) event_rx: mpsc::UnboundedReceiver<AppEvent>,

    // State
    pub(crate) screen: DeviceListScreen,
    pub(crate) console: ConsoleState,

    // UI State
    pub(crate) selected_tab: Tab,
    pub(crate) write_input: String,
    pub(crate) is_dark_mode: bool,

    // Logging guard
    pub(crate) _logging_guard: Option<LoggingGuard>,
}

impl DeviceListApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> anyhow::Result<Self> {
        let settings = SettingsService::new()?;

        let logging_guard = init_logger(&settings.get().log_settings)
            .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
            .ok();

        info!("Starting Easy Bluetooth Example");

        let is_dark_mode = settings.get().dark_mode;
        crate::presentation::theme::configure_style(&cc.egui_ctx, is_dark_mode);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let ctx = cc.egui_ctx.clone();
        let sink = EventSink::new(event_tx, Arc::new(move || ctx.request_repaint()));

        let service = create_service(settings.get());
        let worker = BluetoothWorker::spawn(service, settings.get().bluetooth.clone(), sink)?;

        Ok(Self {
            settings,
            worker,
            event_rx,
            screen: DeviceListScreen::new(),
            console: ConsoleState::new(),
            selected_tab: Tab::Devices,
            write_input: String::new(),
            is_dark_mode,
            _logging_guard: logging_guard,
        })
    }

    pub(crate) fn send(&self, command: BluetoothCommand) {
        self.worker.send(command);
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                AppEvent::DeviceFound(device) => {
                    if self.screen.on_device_found(device) {
                        debug!(
                            changed_rows = ?self.screen.data_source().changed_rows(),
                            "Device list changed"
                        );
                    }
                }
                AppEvent::StatusChange(status) => {
                    self.screen.on_status_change(status);
                    self.console.apply(AppEvent::StatusChange(status));
                }
                other => {
                    self.console.apply(other);
                }
            }
        }
    }

    fn toggle_theme(&mut self, ctx: &egui::Context) {
        self.is_dark_mode = !self.is_dark_mode;
        crate::presentation::theme::configure_style(ctx, self.is_dark_mode);
        if let Err(e) = self.settings.set_dark_mode(self.is_dark_mode) {
            warn!("Failed to save settings: {}", e);
        }
    }
}

impl eframe::App for DeviceListApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.selectable_value(&mut self.selected_tab, Tab::Devices, "Devices");
                ui.selectable_value(&mut self.selected_tab, Tab::Console, "Console");

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let switch_icon = if self.is_dark_mode {
                        "☀ Light"
                    } else {
                        "🌙 Dark"
                    };
                    if ui.button(switch_icon).clicked() {
                        self.toggle_theme(ctx);
                    }
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.set_max_width(640.0);
                ui.add_space(20.0);

                use crate::presentation::tabs;
                match self.selected_tab {
                    Tab::Devices => tabs::devices::render(self, ui),
                    Tab::Console => tabs::console::render(self, ui),
                }
            });
        });
    }
}
