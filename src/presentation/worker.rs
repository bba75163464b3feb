//! Bluetooth worker thread.
//!
//! Hosts a current-thread tokio runtime that owns every call into the
//! Bluetooth service. Each call chain runs as its own task, so a pending
//! `start_scan` never holds up a later `stop_scan`.

use crate::domain::models::{AppEvent, BluetoothCommand};
use crate::domain::settings::BluetoothConfig;
use crate::infrastructure::bluetooth::events::{forward, Subscriptions};
use crate::infrastructure::bluetooth::BluetoothService;
use crate::presentation::pipeline::{report_failure, run_connect, run_setup};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Delivers events to the UI thread and wakes it up.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<AppEvent>,
    wake: Arc<dyn Fn() + Send + Sync>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<AppEvent>, wake: Arc<dyn Fn() + Send + Sync>) -> Self {
        Self { tx, wake }
    }

    /// Returns `false` once the UI side is gone.
    pub fn send(&self, event: AppEvent) -> bool {
        let delivered = self.tx.send(event).is_ok();
        (self.wake)();
        delivered
    }
}

pub struct BluetoothWorker {
    commands: mpsc::UnboundedSender<BluetoothCommand>,
    thread: Option<JoinHandle<()>>,
}

impl BluetoothWorker {
    pub fn spawn(
        service: Arc<dyn BluetoothService>,
        config: BluetoothConfig,
        sink: EventSink,
    ) -> anyhow::Result<Self> {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let thread = std::thread::Builder::new()
            .name("bluetooth".to_string())
            .spawn(move || rt.block_on(run(service, config, sink, command_rx)))?;

        Ok(Self {
            commands,
            thread: Some(thread),
        })
    }

    pub fn send(&self, command: BluetoothCommand) {
        if self.commands.send(command).is_err() {
            error!("Bluetooth worker is not running");
        }
    }
}

impl Drop for BluetoothWorker {
    fn drop(&mut self) {
        let _ = self.commands.send(BluetoothCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Bluetooth worker panicked");
            }
        }
    }
}

/// Register the screen's listeners, one forwarding task per event kind.
fn subscribe(service: &dyn BluetoothService, sink: &EventSink) -> Subscriptions {
    let events = service.events();
    let mut subscriptions = Subscriptions::new();

    let s = sink.clone();
    subscriptions.add(forward(events.subscribe_device_found(), move |device| {
        s.send(AppEvent::DeviceFound(device))
    }));
    let s = sink.clone();
    subscriptions.add(forward(events.subscribe_status_change(), move |status| {
        s.send(AppEvent::StatusChange(status))
    }));
    let s = sink.clone();
    subscriptions.add(forward(events.subscribe_data_read(), move |line| {
        s.send(AppEvent::DataRead(line))
    }));
    let s = sink.clone();
    subscriptions.add(forward(events.subscribe_device_name(), move |name| {
        s.send(AppEvent::DeviceName(name))
    }));

    subscriptions
}

pub(crate) async fn run(
    service: Arc<dyn BluetoothService>,
    config: BluetoothConfig,
    sink: EventSink,
    mut commands: mpsc::UnboundedReceiver<BluetoothCommand>,
) {
    let mut subscriptions = subscribe(service.as_ref(), &sink);
    debug!(listeners = subscriptions.len(), "Listeners registered");

    {
        let service = service.clone();
        tokio::spawn(async move {
            report_failure(run_setup(service.as_ref(), config).await);
        });
    }

    while let Some(command) = commands.recv().await {
        debug!(?command, "Bluetooth command");
        let service = service.clone();
        let sink = sink.clone();

        match command {
            BluetoothCommand::Shutdown => break,
            BluetoothCommand::Connect(device) => {
                tokio::spawn(async move {
                    report_failure(run_connect(service.as_ref(), &device).await);
                });
            }
            BluetoothCommand::Write(text) => {
                tokio::spawn(async move {
                    if let Err(e) = service.write(&text).await {
                        warn!("write failed: {}", e);
                    }
                });
            }
            BluetoothCommand::Writeln(text) => {
                tokio::spawn(async move {
                    if let Err(e) = service.writeln(&text).await {
                        warn!("writeln failed: {}", e);
                    }
                });
            }
            BluetoothCommand::QueryStatus => {
                tokio::spawn(async move {
                    match service.status().await {
                        Ok(status) => {
                            sink.send(AppEvent::CurrentStatus(status));
                        }
                        Err(e) => warn!("getStatus failed: {}", e),
                    }
                });
            }
            BluetoothCommand::QueryAdapter => {
                tokio::spawn(async move {
                    match service.is_adapter_enabled().await {
                        Ok(enabled) => {
                            sink.send(AppEvent::AdapterState(enabled));
                        }
                        Err(e) => warn!("isAdapterEnabled failed: {}", e),
                    }
                });
            }
            BluetoothCommand::EnableAdapter => {
                tokio::spawn(async move {
                    match service.enable_adapter().await {
                        Ok(()) => {
                            sink.send(AppEvent::AdapterState(true));
                        }
                        Err(e) => warn!("enable failed: {}", e),
                    }
                });
            }
            BluetoothCommand::QueryBondedDevices => {
                tokio::spawn(async move {
                    match service.bonded_devices().await {
                        Ok(devices) => {
                            sink.send(AppEvent::BondedDevices(devices));
                        }
                        Err(e) => warn!("getBondedDevices failed: {}", e),
                    }
                });
            }
            BluetoothCommand::StopService => {
                tokio::spawn(async move {
                    match service.stop_service().await {
                        Ok(()) => {
                            sink.send(AppEvent::ServiceStopped);
                        }
                        Err(e) => warn!("stopService failed: {}", e),
                    }
                });
            }
        }
    }

    info!("Bluetooth worker shutting down");
    subscriptions.unsubscribe_all();
    if let Err(e) = service.stop_service().await {
        debug!("stopService on shutdown: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{BluetoothStatus, Device};
    use crate::infrastructure::bluetooth::simulated::{Advertisement, SimulatedBluetooth};
    use crate::infrastructure::bluetooth::EventHub;
    use crate::presentation::pipeline::tests::RecordingService;
    use std::time::Duration;

    fn sink() -> (EventSink, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventSink::new(tx, Arc::new(|| {})), rx)
    }

    async fn next_matching<F>(rx: &mut mpsc::UnboundedReceiver<AppEvent>, mut f: F) -> AppEvent
    where
        F: FnMut(&AppEvent) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let event = rx.recv().await.expect("event channel closed");
                if f(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    #[tokio::test]
    async fn test_discoveries_reach_ui_and_connect_runs() {
        let service: Arc<dyn BluetoothService> = Arc::new(
            SimulatedBluetooth::new(EventHub::default())
                .with_script(vec![
                    Advertisement::new(1, "00:1A:7D:DA:71:13", "HC-05"),
                    Advertisement::new(1, "98:D3:31:F5:2A:0C", "Arduino Serial"),
                ])
                .with_timings(Duration::from_secs(60), Duration::ZERO, Duration::ZERO),
        );
        let (sink, mut events) = sink();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run(
            service.clone(),
            BluetoothConfig::default(),
            sink,
            command_rx,
        ));

        let first = next_matching(&mut events, |e| matches!(e, AppEvent::DeviceFound(_))).await;
        let AppEvent::DeviceFound(device) = first else {
            unreachable!()
        };
        assert_eq!(device.address, "00:1A:7D:DA:71:13");

        command_tx.send(BluetoothCommand::Connect(device)).unwrap();
        next_matching(&mut events, |e| {
            matches!(e, AppEvent::StatusChange(BluetoothStatus::Connected))
        })
        .await;
        let name = next_matching(&mut events, |e| matches!(e, AppEvent::DeviceName(_))).await;
        assert!(matches!(name, AppEvent::DeviceName(n) if n == "HC-05"));

        command_tx.send(BluetoothCommand::Writeln("ping".to_string())).unwrap();
        let line = next_matching(&mut events, |e| matches!(e, AppEvent::DataRead(_))).await;
        assert!(matches!(line, AppEvent::DataRead(l) if l == "ping"));

        command_tx.send(BluetoothCommand::Shutdown).unwrap();
        worker.await.unwrap();
        assert!(service.status().await.is_err());
    }

    #[tokio::test]
    async fn test_queries_answer_through_events() {
        let service: Arc<dyn BluetoothService> = Arc::new(
            SimulatedBluetooth::new(EventHub::default())
                .with_adapter_disabled()
                .with_bonded(vec![Device::new("00:1A:7D:DA:71:13", "HC-05")]),
        );
        let (sink, mut events) = sink();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run(service, BluetoothConfig::default(), sink, command_rx));

        command_tx.send(BluetoothCommand::QueryAdapter).unwrap();
        let state = next_matching(&mut events, |e| matches!(e, AppEvent::AdapterState(_))).await;
        assert!(matches!(state, AppEvent::AdapterState(false)));

        command_tx.send(BluetoothCommand::EnableAdapter).unwrap();
        let state = next_matching(&mut events, |e| matches!(e, AppEvent::AdapterState(_))).await;
        assert!(matches!(state, AppEvent::AdapterState(true)));

        command_tx.send(BluetoothCommand::QueryBondedDevices).unwrap();
        let bonded =
            next_matching(&mut events, |e| matches!(e, AppEvent::BondedDevices(_))).await;
        assert!(matches!(bonded, AppEvent::BondedDevices(d) if d.len() == 1));

        command_tx.send(BluetoothCommand::Shutdown).unwrap();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_setup_does_not_stop_worker() {
        let recording = Arc::new(RecordingService::failing(&["configure"]));
        let service: Arc<dyn BluetoothService> = recording.clone();
        let (sink, _events) = sink();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run(service, BluetoothConfig::default(), sink, command_rx));

        command_tx
            .send(BluetoothCommand::Connect(Device::new("00:00:00:00:00:01", "A")))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        command_tx.send(BluetoothCommand::Shutdown).unwrap();
        worker.await.unwrap();

        assert_eq!(
            recording.calls(),
            vec!["configure", "stop_scan", "connect", "stop_service"]
        );
    }
}
