//! WinRT Bluetooth backend
//!
//! Scanning uses the LE advertisement watcher. Connecting opens the GATT
//! service matching the configured service UUID, subscribes to its first
//! notifying characteristic for inbound data and writes to its first
//! writable characteristic.

use crate::domain::error::ServiceError;
use crate::domain::framing::LineFramer;
use crate::domain::models::{address_to_u64, format_address, BluetoothStatus, Device};
use crate::domain::settings::{BluetoothConfig, ServiceUuid};
use crate::infrastructure::bluetooth::events::EventHub;
use crate::infrastructure::bluetooth::scan_session::{ScanSessions, SessionId};
use crate::infrastructure::bluetooth::status::StatusCell;
use crate::infrastructure::bluetooth::{with_delimiter, BluetoothService};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{info, warn};
use windows::core::GUID;
use windows::Devices::Bluetooth::Advertisement::{
    BluetoothLEAdvertisementReceivedEventArgs, BluetoothLEAdvertisementWatcher,
    BluetoothLEAdvertisementWatcherStoppedEventArgs, BluetoothLEScanningMode,
};
use windows::Devices::Bluetooth::GenericAttributeProfile::{
    GattCharacteristic, GattCharacteristicProperties,
    GattClientCharacteristicConfigurationDescriptorValue, GattCommunicationStatus,
    GattValueChangedEventArgs,
};
use windows::Devices::Bluetooth::{BluetoothAdapter, BluetoothConnectionStatus, BluetoothLEDevice};
use windows::Devices::Enumeration::DeviceInformation;
use windows::Devices::Radios::{Radio, RadioAccessStatus, RadioState};
use windows::Foundation::TypedEventHandler;
use windows::Storage::Streams::{DataReader, DataWriter};

const STOP_SETTLE: Duration = Duration::from_secs(1);

fn to_guid(uuid: ServiceUuid) -> GUID {
    GUID::from_u128(uuid.as_u128())
}

fn map_connection_status(status: BluetoothConnectionStatus) -> BluetoothStatus {
    match status {
        BluetoothConnectionStatus::Connected => BluetoothStatus::Connected,
        _ => BluetoothStatus::None,
    }
}

/// An open peer with the handlers registered on it.
struct Link {
    device: BluetoothLEDevice,
    status_token: i64,
    notify: Option<(GattCharacteristic, i64)>,
    write_char: Option<GattCharacteristic>,
}

impl Link {
    fn close(self) {
        if let Some((characteristic, token)) = &self.notify {
            let _ = characteristic.RemoveValueChanged(*token);
        }
        let _ = self.device.RemoveConnectionStatusChanged(self.status_token);
        let _ = self.device.Close();
    }
}

#[derive(Default)]
struct WinState {
    config: Option<BluetoothConfig>,
    watcher: Option<BluetoothLEAdvertisementWatcher>,
    link: Option<Link>,
}

pub struct WinRtBluetooth {
    events: EventHub,
    status: StatusCell,
    state: Mutex<WinState>,
    scans: Arc<Mutex<ScanSessions>>,
    framer: Arc<Mutex<Option<LineFramer>>>,
}

impl WinRtBluetooth {
    pub fn new(events: EventHub) -> Self {
        Self {
            status: StatusCell::new(events.clone()),
            events,
            state: Mutex::new(WinState::default()),
            scans: Arc::new(Mutex::new(ScanSessions::default())),
            framer: Arc::new(Mutex::new(None)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, WinState>, ServiceError> {
        self.state
            .lock()
            .map_err(|_| ServiceError::Backend("Lock error".to_string()))
    }

    fn config(&self) -> Result<BluetoothConfig, ServiceError> {
        self.lock()?.config.clone().ok_or(ServiceError::NotConfigured)
    }

    /// Drop the current peer, if any, along with its handlers.
    fn release_link(&self) -> Result<(), ServiceError> {
        let link = self.lock()?.link.take();
        if let Some(link) = link {
            info!("Closing previous Bluetooth link");
            link.close();
        }
        Ok(())
    }

    async fn radio() -> Result<Radio, ServiceError> {
        let adapter = BluetoothAdapter::GetDefaultAsync()
            .map_err(|_| ServiceError::AdapterNotFound)?
            .await
            .map_err(|_| ServiceError::AdapterNotFound)?;
        Ok(adapter.GetRadioAsync()?.await?)
    }

    fn build_watcher(
        &self,
        session: SessionId,
    ) -> Result<BluetoothLEAdvertisementWatcher, ServiceError> {
        let watcher = BluetoothLEAdvertisementWatcher::new()?;
        watcher.SetScanningMode(BluetoothLEScanningMode::Active)?;

        let events = self.events.clone();
        let scans = self.scans.clone();
        let received = TypedEventHandler::new(
            move |_: windows::core::Ref<BluetoothLEAdvertisementWatcher>,
                  args: windows::core::Ref<BluetoothLEAdvertisementReceivedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    let name = args.Advertisement()?.LocalName()?.to_string();
                    let device = Device::new(
                        format_address(args.BluetoothAddress()?),
                        if name.is_empty() {
                            "Unknown".to_string()
                        } else {
                            name
                        },
                    );

                    if let Ok(mut scans) = scans.lock() {
                        scans.record(session, &device);
                    }
                    events.emit_device_found(device);
                }
                Ok(())
            },
        );
        watcher.Received(&received)?;

        let scans = self.scans.clone();
        let stopped = TypedEventHandler::new(
            move |_: windows::core::Ref<BluetoothLEAdvertisementWatcher>,
                  _: windows::core::Ref<BluetoothLEAdvertisementWatcherStoppedEventArgs>| {
                // A replaced watcher stops late; leave the newer session alone.
                if let Ok(mut scans) = scans.lock() {
                    scans.finish_session(session);
                }
                Ok(())
            },
        );
        watcher.Stopped(&stopped)?;

        Ok(watcher)
    }

    fn subscribe_link(&self, device: &BluetoothLEDevice) -> Result<i64, ServiceError> {
        let cell = self.status.clone();
        let status_handler = TypedEventHandler::new(
            move |dev: windows::core::Ref<BluetoothLEDevice>,
                  _: windows::core::Ref<windows::core::IInspectable>| {
                if let Some(dev) = dev.as_ref() {
                    if let Ok(status) = dev.ConnectionStatus() {
                        cell.set(map_connection_status(status));
                    }
                }
                Ok(())
            },
        );
        Ok(device.ConnectionStatusChanged(&status_handler)?)
    }

    fn subscribe_data(&self, characteristic: &GattCharacteristic) -> Result<i64, ServiceError> {
        let events = self.events.clone();
        let framer = self.framer.clone();
        let data_handler = TypedEventHandler::new(
            move |_: windows::core::Ref<GattCharacteristic>,
                  args: windows::core::Ref<GattValueChangedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    let reader = DataReader::FromBuffer(&args.CharacteristicValue()?)?;
                    let mut bytes = vec![0u8; reader.UnconsumedBufferLength()? as usize];
                    reader.ReadBytes(&mut bytes)?;

                    let lines = match framer.lock() {
                        Ok(mut framer) => framer
                            .as_mut()
                            .map(|f| f.push(&bytes))
                            .unwrap_or_default(),
                        Err(_) => Vec::new(),
                    };
                    for line in lines {
                        events.emit_data_read(line);
                    }
                }
                Ok(())
            },
        );
        Ok(characteristic.ValueChanged(&data_handler)?)
    }

    /// Open the configured GATT service; returns (notify, write) characteristics.
    async fn open_service(
        device: &BluetoothLEDevice,
        service_uuid: ServiceUuid,
    ) -> Result<(Option<GattCharacteristic>, Option<GattCharacteristic>), ServiceError> {
        let services_result = device
            .GetGattServicesForUuidAsync(to_guid(service_uuid))?
            .await?;
        if services_result.Status()? != GattCommunicationStatus::Success {
            return Err(ServiceError::Backend(format!(
                "Failed to get GATT services: {:?}",
                services_result.Status()?
            )));
        }

        let services = services_result.Services()?;
        if services.Size()? == 0 {
            return Err(ServiceError::Backend(format!(
                "Service {} not found on device",
                service_uuid
            )));
        }
        let service = services.GetAt(0)?;

        let chars_result = service.GetCharacteristicsAsync()?.await?;
        if chars_result.Status()? != GattCommunicationStatus::Success {
            return Err(ServiceError::Backend(
                "Failed to get characteristics".to_string(),
            ));
        }

        let characteristics = chars_result.Characteristics()?;
        let mut notify_char = None;
        let mut write_char = None;

        for i in 0..characteristics.Size()? {
            let c = characteristics.GetAt(i)?;
            let props = c.CharacteristicProperties()?;

            if notify_char.is_none() && props.contains(GattCharacteristicProperties::Notify) {
                notify_char = Some(c.clone());
            }
            if write_char.is_none()
                && (props.contains(GattCharacteristicProperties::Write)
                    || props.contains(GattCharacteristicProperties::WriteWithoutResponse))
            {
                write_char = Some(c);
            }
        }

        Ok((notify_char, write_char))
    }
}

#[async_trait]
impl BluetoothService for WinRtBluetooth {
    fn events(&self) -> &EventHub {
        &self.events
    }

    async fn configure(&self, config: BluetoothConfig) -> Result<BluetoothConfig, ServiceError> {
        Self::radio().await?;
        info!(service_uuid = %config.service_uuid, device_name = %config.device_name, "configure");

        if let Ok(mut framer) = self.framer.lock() {
            *framer = Some(LineFramer::from_config(&config));
        }
        self.lock()?.config = Some(config.clone());
        Ok(config)
    }

    async fn start_scan(&self) -> Result<Vec<Device>, ServiceError> {
        self.config()?;
        info!("Starting BLE advertisement scan");

        let rx = {
            let mut state = self.lock()?;
            if let Some(old) = state.watcher.take() {
                let _ = old.Stop();
            }

            let (session, rx) = self
                .scans
                .lock()
                .map_err(|_| ServiceError::Backend("Lock error".to_string()))?
                .begin();
            let watcher = self.build_watcher(session)?;
            watcher.Start()?;
            state.watcher = Some(watcher);
            rx
        };

        rx.await
            .map_err(|_| ServiceError::Backend("scan ended without a result".to_string()))
    }

    async fn stop_scan(&self) -> Result<(), ServiceError> {
        self.config()?;
        let watcher = self.lock()?.watcher.take();
        if let Some(watcher) = watcher {
            info!("Stopping BLE scan...");
            watcher.Stop()?;
        }
        if let Ok(mut scans) = self.scans.lock() {
            scans.finish();
        }

        tokio::time::sleep(STOP_SETTLE).await;
        Ok(())
    }

    async fn connect(&self, device: &Device) -> Result<(), ServiceError> {
        let config = self.config()?;
        let address = address_to_u64(&device.address)
            .ok_or_else(|| ServiceError::InvalidAddress(device.address.clone()))?;

        info!("Connecting to Bluetooth device: {:#X}", address);
        self.release_link()?;
        self.status.set(BluetoothStatus::Connecting);

        let result = async {
            let le_device = BluetoothLEDevice::FromBluetoothAddressAsync(address)?.await?;
            let (notify_char, write_char) =
                Self::open_service(&le_device, config.service_uuid).await?;

            let mut notify = None;
            if let Some(notify_char) = notify_char {
                let status = notify_char
                    .WriteClientCharacteristicConfigurationDescriptorAsync(
                        GattClientCharacteristicConfigurationDescriptorValue::Notify,
                    )?
                    .await?;
                if status == GattCommunicationStatus::Success {
                    let token = self.subscribe_data(&notify_char)?;
                    notify = Some((notify_char, token));
                } else {
                    warn!("Notification subscription returned status: {:?}", status);
                }
            }
            let status_token = self.subscribe_link(&le_device)?;
            Ok::<_, ServiceError>(Link {
                device: le_device,
                status_token,
                notify,
                write_char,
            })
        }
        .await;

        match result {
            Ok(link) => {
                let name = link.device.Name()?.to_string();
                let connected =
                    link.device.ConnectionStatus()? == BluetoothConnectionStatus::Connected;
                if let Ok(mut framer) = self.framer.lock() {
                    *framer = Some(LineFramer::from_config(&config));
                }
                self.lock()?.link = Some(link);

                // Otherwise the link handler reports it once it comes up.
                if connected {
                    self.status.set(BluetoothStatus::Connected);
                }
                self.events.emit_device_name(name);
                Ok(())
            }
            Err(e) => {
                self.status.set(BluetoothStatus::None);
                Err(e)
            }
        }
    }

    async fn status(&self) -> Result<BluetoothStatus, ServiceError> {
        self.config()?;
        Ok(self.status.get())
    }

    async fn write(&self, data: &str) -> Result<(), ServiceError> {
        self.config()?;
        let characteristic = self
            .lock()?
            .link
            .as_ref()
            .and_then(|link| link.write_char.clone())
            .ok_or(ServiceError::NotConnected)?;

        let writer = DataWriter::new()?;
        writer.WriteBytes(data.as_bytes())?;
        let buffer = writer.DetachBuffer()?;

        let status = characteristic.WriteValueAsync(&buffer)?.await?;
        if status != GattCommunicationStatus::Success {
            return Err(ServiceError::Backend(format!("Write failed: {:?}", status)));
        }
        Ok(())
    }

    async fn writeln(&self, data: &str) -> Result<(), ServiceError> {
        let line = with_delimiter(data, &self.config()?);
        self.write(&line).await
    }

    async fn stop_service(&self) -> Result<(), ServiceError> {
        self.config()?;
        info!("Stopping Bluetooth service");

        let (watcher, link) = {
            let mut state = self.lock()?;
            state.config = None;
            (state.watcher.take(), state.link.take())
        };
        if let Some(watcher) = watcher {
            let _ = watcher.Stop();
        }
        if let Ok(mut scans) = self.scans.lock() {
            scans.finish();
        }
        if let Some(link) = link {
            link.close();
        }
        if let Ok(mut framer) = self.framer.lock() {
            *framer = None;
        }

        self.status.set(BluetoothStatus::None);
        Ok(())
    }

    async fn is_adapter_enabled(&self) -> Result<bool, ServiceError> {
        let radio = Self::radio().await?;
        Ok(radio.State()? == RadioState::On)
    }

    async fn enable_adapter(&self) -> Result<(), ServiceError> {
        let radio = Self::radio().await?;
        match radio.SetStateAsync(RadioState::On)?.await? {
            RadioAccessStatus::Allowed => Ok(()),
            _ => Err(ServiceError::AdapterEnable),
        }
    }

    async fn bonded_devices(&self) -> Result<Vec<Device>, ServiceError> {
        Self::radio().await?;
        let selector = BluetoothLEDevice::GetDeviceSelectorFromPairingState(true)?;
        let infos = DeviceInformation::FindAllAsyncAqsFilter(&selector)?.await?;

        let mut devices = Vec::new();
        for i in 0..infos.Size()? {
            let info = infos.GetAt(i)?;
            let le_device = BluetoothLEDevice::FromIdAsync(&info.Id()?)?.await?;
            devices.push(Device::new(
                format_address(le_device.BluetoothAddress()?),
                info.Name()?.to_string(),
            ));
        }
        Ok(devices)
    }
}
