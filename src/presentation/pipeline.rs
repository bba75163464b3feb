//! Sequential Bluetooth call chains run on behalf of the device list.
//!
//! Each chain is a fixed series of named stages; the first failing stage
//! ends the chain and is reported in the returned [`PipelineError`].

use crate::domain::error::ServiceError;
use crate::domain::models::Device;
use crate::domain::settings::BluetoothConfig;
use crate::infrastructure::bluetooth::BluetoothService;
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configure,
    StartScan,
    StopScan,
    Connect,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Configure => "configure",
            Stage::StartScan => "start scan",
            Stage::StopScan => "stop scan",
            Stage::Connect => "connect",
        })
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("service operation failed ({stage}): {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: ServiceError,
}

trait StageResult<T> {
    fn at(self, stage: Stage) -> Result<T, PipelineError>;
}

impl<T> StageResult<T> for Result<T, ServiceError> {
    fn at(self, stage: Stage) -> Result<T, PipelineError> {
        self.map_err(|source| PipelineError { stage, source })
    }
}

/// configure → start scan → report.
///
/// The device set returned by the scan is only logged; the list on screen
/// is fed exclusively by "device found" events.
pub async fn run_setup(
    service: &dyn BluetoothService,
    config: BluetoothConfig,
) -> Result<Vec<Device>, PipelineError> {
    let accepted = service.configure(config).await.at(Stage::Configure)?;
    info!(?accepted, "Configured");

    let devices = service.start_scan().await.at(Stage::StartScan)?;
    info!(count = devices.len(), "Devices found: {:?}", devices);

    Ok(devices)
}

/// stop scan → connect → confirm.
pub async fn run_connect(
    service: &dyn BluetoothService,
    device: &Device,
) -> Result<(), PipelineError> {
    service.stop_scan().await.at(Stage::StopScan)?;
    service.connect(device).await.at(Stage::Connect)?;
    info!("Connecting to {}", device);
    Ok(())
}

/// Terminal handler shared by every chain: a warning and nothing else.
pub fn report_failure<T>(result: Result<T, PipelineError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(stage = %e.stage, "{}", e);
            None
        }
    }
}
