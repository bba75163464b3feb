//! Simulated Bluetooth backend
//!
//! Replays a fixed advertisement script while scanning and behaves like a
//! serial echo peer once connected: whatever is written comes back through
//! the line framer as "data read" events.

use crate::domain::error::ServiceError;
use crate::domain::framing::LineFramer;
use crate::domain::models::{is_valid_address, BluetoothStatus, Device};
use crate::domain::settings::BluetoothConfig;
use crate::infrastructure::bluetooth::events::EventHub;
use crate::infrastructure::bluetooth::scan_session::{ScanSessions, SessionId};
use crate::infrastructure::bluetooth::status::StatusCell;
use crate::infrastructure::bluetooth::{with_delimiter, BluetoothService};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// One scripted discovery, emitted `delay` after the previous one.
#[derive(Debug, Clone)]
pub struct Advertisement {
    pub delay: Duration,
    pub device: Device,
}

impl Advertisement {
    pub fn new(delay_ms: u64, address: &str, name: &str) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            device: Device::new(address, name),
        }
    }
}

/// Nearby peers: one re-advertises, another changes its name mid-scan.
fn default_script() -> Vec<Advertisement> {
    vec![
        Advertisement::new(400, "00:1A:7D:DA:71:13", "HC-05"),
        Advertisement::new(400, "98:D3:31:F5:2A:0C", "Arduino Serial"),
        Advertisement::new(400, "00:1A:7D:DA:71:13", "HC-05"),
        Advertisement::new(400, "5C:F3:70:8B:11:42", "Thermal Printer"),
        Advertisement::new(400, "98:D3:31:F5:2A:0C", "Arduino Serial (renamed)"),
    ]
}

fn default_bonded() -> Vec<Device> {
    vec![Device::new("00:1A:7D:DA:71:13", "HC-05")]
}

#[derive(Default)]
struct SimState {
    config: Option<BluetoothConfig>,
    adapter_enabled: bool,
    connected: Option<Device>,
    framer: Option<LineFramer>,
    scans: ScanSessions,
    scan_task: Option<JoinHandle<()>>,
}

impl SimState {
    fn require_config(&self) -> Result<&BluetoothConfig, ServiceError> {
        self.config.as_ref().ok_or(ServiceError::NotConfigured)
    }

    fn abort_scan(&mut self) {
        if let Some(task) = self.scan_task.take() {
            task.abort();
        }
        self.scans.finish();
    }
}

pub struct SimulatedBluetooth {
    events: EventHub,
    status: StatusCell,
    state: Arc<Mutex<SimState>>,
    script: Vec<Advertisement>,
    bonded: Vec<Device>,
    adapter_present: bool,
    scan_duration: Duration,
    stop_settle: Duration,
    connect_delay: Duration,
}

impl SimulatedBluetooth {
    pub fn new(events: EventHub) -> Self {
        Self {
            status: StatusCell::new(events.clone()),
            events,
            state: Arc::new(Mutex::new(SimState {
                adapter_enabled: true,
                ..Default::default()
            })),
            script: default_script(),
            bonded: default_bonded(),
            adapter_present: true,
            // Classic inquiry runs for roughly 12 seconds.
            scan_duration: Duration::from_secs(12),
            stop_settle: Duration::from_secs(1),
            connect_delay: Duration::from_millis(300),
        }
    }

    #[cfg(test)]
    pub fn with_script(mut self, script: Vec<Advertisement>) -> Self {
        self.script = script;
        self
    }

    #[cfg(test)]
    pub fn with_bonded(mut self, bonded: Vec<Device>) -> Self {
        self.bonded = bonded;
        self
    }

    #[cfg(test)]
    pub fn with_timings(
        mut self,
        scan_duration: Duration,
        stop_settle: Duration,
        connect_delay: Duration,
    ) -> Self {
        self.scan_duration = scan_duration;
        self.stop_settle = stop_settle;
        self.connect_delay = connect_delay;
        self
    }

    #[cfg(test)]
    pub fn without_adapter(mut self) -> Self {
        self.adapter_present = false;
        self
    }

    #[cfg(test)]
    pub fn with_adapter_disabled(self) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.adapter_enabled = false;
        }
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, SimState>, ServiceError> {
        self.state
            .lock()
            .map_err(|_| ServiceError::Backend("simulator state poisoned".to_string()))
    }

    fn require_adapter(&self) -> Result<(), ServiceError> {
        if self.adapter_present {
            Ok(())
        } else {
            Err(ServiceError::AdapterNotFound)
        }
    }

    fn is_reachable(&self, device: &Device) -> bool {
        self.script
            .iter()
            .map(|adv| &adv.device)
            .chain(self.bonded.iter())
            .any(|d| d.address == device.address)
    }

    fn spawn_scan(&self, session: SessionId) -> JoinHandle<()> {
        let state = self.state.clone();
        let events = self.events.clone();
        let script = self.script.clone();
        let scan_duration = self.scan_duration;

        tokio::spawn(async move {
            let mut elapsed = Duration::ZERO;
            for adv in script {
                tokio::time::sleep(adv.delay).await;
                elapsed += adv.delay;

                let recorded = match state.lock() {
                    Ok(mut state) => state.scans.record(session, &adv.device),
                    Err(_) => false,
                };
                if !recorded {
                    return;
                }
                events.emit_device_found(adv.device);
            }

            tokio::time::sleep(scan_duration.saturating_sub(elapsed)).await;
            if let Ok(mut state) = state.lock() {
                debug!("Simulated scan finished");
                state.scan_task = None;
                state.scans.finish_session(session);
            }
        })
    }
}

#[async_trait]
impl BluetoothService for SimulatedBluetooth {
    fn events(&self) -> &EventHub {
        &self.events
    }

    async fn configure(&self, config: BluetoothConfig) -> Result<BluetoothConfig, ServiceError> {
        self.require_adapter()?;
        info!(
            service_uuid = %config.service_uuid,
            device_name = %config.device_name,
            buffer_size = config.buffer_size.get(),
            "configure"
        );

        let mut state = self.lock()?;
        state.framer = Some(LineFramer::from_config(&config));
        state.config = Some(config.clone());
        Ok(config)
    }

    async fn start_scan(&self) -> Result<Vec<Device>, ServiceError> {
        let rx = {
            let mut state = self.lock()?;
            state.require_config()?;
            if !state.adapter_enabled {
                return Err(ServiceError::Backend("Bluetooth adapter is disabled".to_string()));
            }

            info!("startScan");
            state.abort_scan();
            let (session, rx) = state.scans.begin();
            state.scan_task = Some(self.spawn_scan(session));
            rx
        };

        rx.await
            .map_err(|_| ServiceError::Backend("scan ended without a result".to_string()))
    }

    async fn stop_scan(&self) -> Result<(), ServiceError> {
        {
            let mut state = self.lock()?;
            state.require_config()?;
            info!("stopScan");
            state.abort_scan();
        }

        tokio::time::sleep(self.stop_settle).await;
        Ok(())
    }

    async fn connect(&self, device: &Device) -> Result<(), ServiceError> {
        {
            let mut state = self.lock()?;
            state.require_config()?;
            info!(address = %device.address, "connect");

            if !is_valid_address(&device.address) {
                return Err(ServiceError::InvalidAddress(device.address.clone()));
            }
            self.status.set(BluetoothStatus::Connecting);
        }

        tokio::time::sleep(self.connect_delay).await;

        let mut state = self.lock()?;
        if !self.is_reachable(device) {
            self.status.set(BluetoothStatus::None);
            return Err(ServiceError::Backend(format!(
                "{} did not answer",
                device.address
            )));
        }

        state.connected = Some(device.clone());
        state.framer = state.config.as_ref().map(LineFramer::from_config);
        self.status.set(BluetoothStatus::Connected);
        self.events.emit_device_name(device.name.clone());
        Ok(())
    }

    async fn status(&self) -> Result<BluetoothStatus, ServiceError> {
        self.lock()?.require_config()?;
        Ok(self.status.get())
    }

    async fn write(&self, data: &str) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        state.require_config()?;
        if state.connected.is_none() {
            return Err(ServiceError::NotConnected);
        }
        debug!(bytes = data.len(), "write");

        let lines = match &mut state.framer {
            Some(framer) => framer.push(data.as_bytes()),
            None => Vec::new(),
        };
        for line in lines {
            self.events.emit_data_read(line);
        }
        Ok(())
    }

    async fn writeln(&self, data: &str) -> Result<(), ServiceError> {
        let line = {
            let state = self.lock()?;
            with_delimiter(data, state.require_config()?)
        };
        self.write(&line).await
    }

    async fn stop_service(&self) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        state.require_config()?;
        info!("stopService");

        state.abort_scan();
        state.connected = None;
        state.framer = None;
        state.config = None;
        self.status.set(BluetoothStatus::None);
        Ok(())
    }

    async fn is_adapter_enabled(&self) -> Result<bool, ServiceError> {
        self.require_adapter()?;
        Ok(self.lock()?.adapter_enabled)
    }

    async fn enable_adapter(&self) -> Result<(), ServiceError> {
        self.require_adapter()?;
        self.lock()?.adapter_enabled = true;
        Ok(())
    }

    async fn bonded_devices(&self) -> Result<Vec<Device>, ServiceError> {
        self.require_adapter()?;
        Ok(self.bonded.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::settings::BufferSize;

    fn quick() -> SimulatedBluetooth {
        SimulatedBluetooth::new(EventHub::default()).with_timings(
            Duration::from_millis(50),
            Duration::ZERO,
            Duration::ZERO,
        )
    }

    fn script() -> Vec<Advertisement> {
        vec![
            Advertisement::new(1, "00:00:00:00:00:01", "A"),
            Advertisement::new(1, "00:00:00:00:00:02", "B"),
            Advertisement::new(1, "00:00:00:00:00:01", "A"),
        ]
    }

    #[tokio::test]
    async fn test_requires_configure() {
        let bt = quick();
        assert_eq!(bt.start_scan().await, Err(ServiceError::NotConfigured));
        assert_eq!(bt.stop_scan().await, Err(ServiceError::NotConfigured));
        assert_eq!(bt.status().await, Err(ServiceError::NotConfigured));
        assert_eq!(
            bt.connect(&Device::new("00:1A:7D:DA:71:13", "HC-05")).await,
            Err(ServiceError::NotConfigured)
        );
        // Adapter queries work without configuration.
        assert_eq!(bt.is_adapter_enabled().await, Ok(true));
    }

    #[tokio::test]
    async fn test_configure_echoes_config() {
        let bt = quick();
        let config = BluetoothConfig {
            buffer_size: BufferSize::new(16).unwrap(),
            ..Default::default()
        };
        assert_eq!(bt.configure(config.clone()).await, Ok(config));
        assert_eq!(bt.status().await, Ok(BluetoothStatus::None));
    }

    #[tokio::test]
    async fn test_scan_resolves_with_discoveries_and_emits_events() {
        let bt = quick().with_script(script());
        let mut found_rx = bt.events().subscribe_device_found();
        bt.configure(BluetoothConfig::default()).await.unwrap();

        let found = bt.start_scan().await.unwrap();
        assert_eq!(found.len(), 3);

        let mut emitted = Vec::new();
        while let Ok(device) = found_rx.try_recv() {
            emitted.push(device.address);
        }
        assert_eq!(
            emitted,
            vec!["00:00:00:00:00:01", "00:00:00:00:00:02", "00:00:00:00:00:01"]
        );
    }

    #[tokio::test]
    async fn test_stop_scan_resolves_pending_scan() {
        let bt = Arc::new(
            quick()
                .with_script(vec![Advertisement::new(1, "00:00:00:00:00:01", "A")])
                .with_timings(Duration::from_secs(60), Duration::ZERO, Duration::ZERO),
        );
        bt.configure(BluetoothConfig::default()).await.unwrap();

        let scanning = {
            let bt = bt.clone();
            tokio::spawn(async move { bt.start_scan().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        bt.stop_scan().await.unwrap();

        let found = scanning.await.unwrap().unwrap();
        assert_eq!(found, vec![Device::new("00:00:00:00:00:01", "A")]);
    }

    #[tokio::test]
    async fn test_restarted_scan_keeps_new_session_open() {
        let bt = Arc::new(
            quick()
                .with_script(vec![Advertisement::new(1, "00:00:00:00:00:01", "A")])
                .with_timings(Duration::from_secs(60), Duration::ZERO, Duration::ZERO),
        );
        bt.configure(BluetoothConfig::default()).await.unwrap();

        let first = {
            let bt = bt.clone();
            tokio::spawn(async move { bt.start_scan().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = {
            let bt = bt.clone();
            tokio::spawn(async move { bt.start_scan().await })
        };

        let replaced = first.await.unwrap().unwrap();
        assert_eq!(replaced, vec![Device::new("00:00:00:00:00:01", "A")]);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!second.is_finished());

        bt.stop_scan().await.unwrap();
        let found = second.await.unwrap().unwrap();
        assert_eq!(found, vec![Device::new("00:00:00:00:00:01", "A")]);
    }

    #[tokio::test]
    async fn test_connect_validates_address() {
        let bt = quick();
        bt.configure(BluetoothConfig::default()).await.unwrap();

        let err = bt.connect(&Device::new("aa:bb", "Foo")).await;
        assert_eq!(err, Err(ServiceError::InvalidAddress("aa:bb".to_string())));
        assert_eq!(bt.status().await, Ok(BluetoothStatus::None));
    }

    #[tokio::test]
    async fn test_connect_reports_status_and_name() {
        let bt = quick();
        let mut status_rx = bt.events().subscribe_status_change();
        let mut name_rx = bt.events().subscribe_device_name();
        bt.configure(BluetoothConfig::default()).await.unwrap();

        bt.connect(&Device::new("00:1A:7D:DA:71:13", "HC-05"))
            .await
            .unwrap();

        assert_eq!(status_rx.recv().await.unwrap(), BluetoothStatus::Connecting);
        assert_eq!(status_rx.recv().await.unwrap(), BluetoothStatus::Connected);
        assert_eq!(name_rx.recv().await.unwrap(), "HC-05");
        assert_eq!(bt.status().await, Ok(BluetoothStatus::Connected));
    }

    #[tokio::test]
    async fn test_connect_to_unknown_peer_fails() {
        let bt = quick();
        bt.configure(BluetoothConfig::default()).await.unwrap();

        let result = bt.connect(&Device::new("11:22:33:44:55:66", "Ghost")).await;
        assert!(matches!(result, Err(ServiceError::Backend(_))));
        assert_eq!(bt.status().await, Ok(BluetoothStatus::None));
    }

    #[tokio::test]
    async fn test_writeln_echoes_framed_lines() {
        let bt = quick();
        let mut data_rx = bt.events().subscribe_data_read();
        bt.configure(BluetoothConfig::default()).await.unwrap();

        assert_eq!(bt.write("hi").await, Err(ServiceError::NotConnected));

        bt.connect(&Device::new("00:1A:7D:DA:71:13", "HC-05"))
            .await
            .unwrap();
        bt.write("hel").await.unwrap();
        bt.writeln("lo").await.unwrap();

        assert_eq!(data_rx.recv().await.unwrap(), "hello");
        assert!(data_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stop_service_requires_reconfigure() {
        let bt = quick();
        bt.configure(BluetoothConfig::default()).await.unwrap();
        bt.stop_service().await.unwrap();

        assert_eq!(bt.status().await, Err(ServiceError::NotConfigured));
        assert_eq!(bt.stop_service().await, Err(ServiceError::NotConfigured));
    }

    #[tokio::test]
    async fn test_adapter_operations() {
        let missing = quick().without_adapter();
        assert_eq!(missing.is_adapter_enabled().await, Err(ServiceError::AdapterNotFound));
        assert_eq!(
            missing.configure(BluetoothConfig::default()).await,
            Err(ServiceError::AdapterNotFound)
        );

        let disabled = quick().with_adapter_disabled();
        disabled.configure(BluetoothConfig::default()).await.unwrap();
        assert!(disabled.start_scan().await.is_err());
        disabled.enable_adapter().await.unwrap();
        assert_eq!(disabled.is_adapter_enabled().await, Ok(true));

        let bonded = quick().bonded_devices().await.unwrap();
        assert_eq!(bonded, vec![Device::new("00:1A:7D:DA:71:13", "HC-05")]);
    }
}
