use serde::{Deserialize, Serialize};
use std::fmt;

/// A discovered peer, identified by its Bluetooth address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub address: String,
    pub name: String,
}

impl Device {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
        }
    }

    /// Row label shown in the device list.
    pub fn label(&self) -> String {
        format!("{} - {}", self.name, self.address)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// Connection status reported by the Bluetooth service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BluetoothStatus {
    #[default]
    None,
    Connecting,
    Connected,
}

impl BluetoothStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BluetoothStatus::None => "NONE",
            BluetoothStatus::Connecting => "CONNECTING",
            BluetoothStatus::Connected => "CONNECTED",
        }
    }
}

impl fmt::Display for BluetoothStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events delivered from the Bluetooth worker to the UI thread.
#[derive(Debug, Clone)]
pub enum AppEvent {
    DeviceFound(Device),
    StatusChange(BluetoothStatus),
    DataRead(String),
    DeviceName(String),
    /// Answer to [`BluetoothCommand::QueryStatus`].
    CurrentStatus(BluetoothStatus),
    AdapterState(bool),
    BondedDevices(Vec<Device>),
    ServiceStopped,
}

/// Requests sent from the UI thread to the Bluetooth worker.
#[derive(Debug, Clone)]
pub enum BluetoothCommand {
    Connect(Device),
    Write(String),
    Writeln(String),
    QueryStatus,
    QueryAdapter,
    EnableAdapter,
    QueryBondedDevices,
    StopService,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Devices,
    Console,
}

/// Checks the `AA:BB:CC:DD:EE:FF` form: six upper-case hex pairs.
pub fn is_valid_address(address: &str) -> bool {
    let bytes = address.as_bytes();
    if bytes.len() != 17 {
        return false;
    }

    bytes.iter().enumerate().all(|(i, b)| {
        if i % 3 == 2 {
            *b == b':'
        } else {
            b.is_ascii_digit() || (b'A'..=b'F').contains(b)
        }
    })
}

/// Packs a validated address string into the 48-bit integer form.
#[cfg(any(windows, test))]
pub fn address_to_u64(address: &str) -> Option<u64> {
    if !is_valid_address(address) {
        return None;
    }
    u64::from_str_radix(&address.replace(':', ""), 16).ok()
}

#[cfg(any(windows, test))]
pub fn format_address(address: u64) -> String {
    let bytes = address.to_be_bytes();
    bytes[2..]
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}
