//! State of the device list screen.
//!
//! Owned by the UI thread; all mutation happens while draining worker
//! events at the start of a frame, so the address check below never races
//! with another writer.

use crate::domain::device_list::{position_by_address, DeviceList};
use crate::domain::models::{BluetoothCommand, BluetoothStatus, Device};
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct DeviceListScreen {
    devices: Vec<Device>,
    data_source: DeviceList,
    highlighted_row: Option<usize>,
}

impl DeviceListScreen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a discovery unless its address is already listed.
    ///
    /// Only the address is compared: a known address reported under a new
    /// name keeps the name it was first seen with.
    pub fn on_device_found(&mut self, device: Device) -> bool {
        debug!(address = %device.address, name = %device.name, "onDeviceFound");

        if position_by_address(&self.devices, &device.address).is_some() {
            return false;
        }

        self.devices.push(device);
        self.data_source = self.data_source.clone_with_rows(&self.devices);
        debug!(
            rows = self.data_source.len(),
            generation = self.data_source.generation(),
            "data source regenerated"
        );
        true
    }

    pub fn on_status_change(&mut self, status: BluetoothStatus) {
        info!(%status, "onStatusChange");
    }

    /// Row `index` was tapped: toggle its highlight and request a connection.
    pub fn on_device_click(&mut self, device: &Device, index: usize) -> BluetoothCommand {
        info!(%device, index, "Device selected");
        self.highlight_row(index);
        BluetoothCommand::Connect(device.clone())
    }

    pub fn highlight_row(&mut self, index: usize) {
        self.highlighted_row = match self.highlighted_row {
            Some(current) if current == index => None,
            _ => Some(index),
        };
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn data_source(&self) -> &DeviceList {
        &self.data_source
    }

    pub fn highlighted_row(&self) -> Option<usize> {
        self.highlighted_row
    }
}
