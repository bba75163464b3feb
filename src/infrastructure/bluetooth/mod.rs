//! Bluetooth Module
//!
//! The device list talks to Bluetooth only through [`BluetoothService`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            dyn BluetoothService              │
//! │  configure / scan / connect / write / ...    │
//! └──────────────┬───────────────────────────────┘
//!                │ implemented by
//!        ┌───────┴────────┐
//!        ▼                ▼
//! ┌─────────────┐  ┌──────────────┐
//! │  Simulated  │  │    WinRT     │
//! │ (any host)  │  │  (Windows)   │
//! └─────────────┘  └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`events`] - Per-kind notification channels and listener guards
//! - [`scan_session`] - Devices collected while a scan is running
//! - [`simulated`] - In-process backend with a scripted set of peers
//! - [`status`] - Connection status shared with platform callbacks
//! - `winrt` - Native backend on Windows

pub mod events;
pub mod scan_session;
pub mod simulated;
pub mod status;
#[cfg(windows)]
pub mod winrt;

use crate::domain::error::ServiceError;
use crate::domain::models::{BluetoothStatus, Device};
use crate::domain::settings::{BluetoothConfig, Settings};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub use events::EventHub;
pub use simulated::SimulatedBluetooth;

/// Asynchronous boundary to the platform Bluetooth stack.
///
/// Every operation except `configure` and the adapter queries fails with
/// [`ServiceError::NotConfigured`] until `configure` has succeeded.
#[async_trait]
pub trait BluetoothService: Send + Sync {
    /// Notification channels for this service.
    fn events(&self) -> &EventHub;

    /// Apply `config` and return the configuration that was accepted.
    async fn configure(&self, config: BluetoothConfig) -> Result<BluetoothConfig, ServiceError>;

    /// Start discovery. Resolves with the devices found once the scan ends;
    /// each discovery is also published as a "device found" event.
    async fn start_scan(&self) -> Result<Vec<Device>, ServiceError>;

    async fn stop_scan(&self) -> Result<(), ServiceError>;

    /// Resolves once the connection to `device` is established.
    async fn connect(&self, device: &Device) -> Result<(), ServiceError>;

    async fn status(&self) -> Result<BluetoothStatus, ServiceError>;

    async fn write(&self, data: &str) -> Result<(), ServiceError>;

    /// Like [`write`](Self::write) with the configured delimiter appended.
    async fn writeln(&self, data: &str) -> Result<(), ServiceError>;

    /// Tear down the configured service; `configure` must be called again.
    async fn stop_service(&self) -> Result<(), ServiceError>;

    async fn is_adapter_enabled(&self) -> Result<bool, ServiceError>;

    async fn enable_adapter(&self) -> Result<(), ServiceError>;

    async fn bonded_devices(&self) -> Result<Vec<Device>, ServiceError>;
}

/// Line terminated with the configured delimiter.
pub(crate) fn with_delimiter(data: &str, config: &BluetoothConfig) -> String {
    let mut line = String::with_capacity(data.len() + config.line_delimiter.len_utf8());
    line.push_str(data);
    line.push(config.line_delimiter);
    line
}

/// Pick the backend for this host.
pub fn create_service(settings: &Settings) -> Arc<dyn BluetoothService> {
    #[cfg(windows)]
    if !settings.use_simulator {
        info!("Using WinRT Bluetooth backend");
        return Arc::new(winrt::WinRtBluetooth::new(EventHub::default()));
    }

    info!(
        use_simulator = settings.use_simulator,
        "Using simulated Bluetooth backend"
    );
    Arc::new(SimulatedBluetooth::new(EventHub::default()))
}
