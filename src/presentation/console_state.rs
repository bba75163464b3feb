use crate::domain::models::{AppEvent, BluetoothStatus, Device};

/// Received lines kept for display.
const MAX_LINES: usize = 500;

/// Everything the console tab shows besides the device list.
#[derive(Debug, Default)]
pub struct ConsoleState {
    pub last_status: Option<BluetoothStatus>,
    pub device_name: Option<String>,
    pub adapter_enabled: Option<bool>,
    pub bonded_devices: Vec<Device>,
    pub received: Vec<String>,
    pub service_running: bool,
}

impl ConsoleState {
    pub fn new() -> Self {
        Self {
            service_running: true,
            ..Default::default()
        }
    }

    /// Returns whether the event was one this state tracks.
    pub fn apply(&mut self, event: AppEvent) -> bool {
        match event {
            AppEvent::StatusChange(status) | AppEvent::CurrentStatus(status) => {
                self.last_status = Some(status);
            }
            AppEvent::DeviceName(name) => self.device_name = Some(name),
            AppEvent::DataRead(line) => {
                self.received.push(line);
                if self.received.len() > MAX_LINES {
                    let overflow = self.received.len() - MAX_LINES;
                    self.received.drain(..overflow);
                }
            }
            AppEvent::AdapterState(enabled) => self.adapter_enabled = Some(enabled),
            AppEvent::BondedDevices(devices) => self.bonded_devices = devices,
            AppEvent::ServiceStopped => {
                self.service_running = false;
                self.device_name = None;
                self.last_status = Some(BluetoothStatus::None);
            }
            AppEvent::DeviceFound(_) => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_received_lines_are_capped() {
        let mut console = ConsoleState::new();
        for i in 0..MAX_LINES + 10 {
            console.apply(AppEvent::DataRead(i.to_string()));
        }
        assert_eq!(console.received.len(), MAX_LINES);
        assert_eq!(console.received[0], "10");
    }

    #[test]
    fn test_service_stopped_resets_link_info() {
        let mut console = ConsoleState::new();
        console.apply(AppEvent::StatusChange(BluetoothStatus::Connected));
        console.apply(AppEvent::DeviceName("HC-05".to_string()));
        assert!(console.apply(AppEvent::ServiceStopped));

        assert!(!console.service_running);
        assert_eq!(console.device_name, None);
        assert_eq!(console.last_status, Some(BluetoothStatus::None));
        assert!(!console.apply(AppEvent::DeviceFound(Device::new("AA:BB", "Foo"))));
    }
}
