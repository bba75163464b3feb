use thiserror::Error;

/// Failure reported by a Bluetooth service operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Bluetooth adapter not found")]
    AdapterNotFound,
    #[error("Bluetooth service has not been configured, call configure first")]
    NotConfigured,
    #[error("Invalid device address: {0}")]
    InvalidAddress(String),
    #[error("Could not enable bluetooth adapter")]
    AdapterEnable,
    #[error("No device connected")]
    NotConnected,
    #[error("Bluetooth backend error: {0}")]
    Backend(String),
}

#[cfg(windows)]
impl From<windows::core::Error> for ServiceError {
    fn from(e: windows::core::Error) -> Self {
        ServiceError::Backend(e.message().to_string())
    }
}

/// Rejected configuration value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid UUID format: {0}")]
    InvalidUuid(String),
    #[error("Buffer size {0} out of range ({min}..={max})", min = super::settings::BufferSize::MIN, max = super::settings::BufferSize::MAX)]
    BufferSize(usize),
}
