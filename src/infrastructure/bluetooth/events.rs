//! Per-kind event channels published by a Bluetooth service.
//!
//! Each notification kind gets its own broadcast channel. Listeners hold a
//! receiver for as long as they are interested; [`Subscriptions`] ties the
//! forwarding tasks to the lifetime of their owner.

use crate::domain::models::{BluetoothStatus, Device};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct EventHub {
    device_found: broadcast::Sender<Device>,
    status_change: broadcast::Sender<BluetoothStatus>,
    data_read: broadcast::Sender<String>,
    device_name: broadcast::Sender<String>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            device_found: broadcast::channel(capacity).0,
            status_change: broadcast::channel(capacity).0,
            data_read: broadcast::channel(capacity).0,
            device_name: broadcast::channel(capacity).0,
        }
    }

    pub fn subscribe_device_found(&self) -> broadcast::Receiver<Device> {
        self.device_found.subscribe()
    }

    pub fn subscribe_status_change(&self) -> broadcast::Receiver<BluetoothStatus> {
        self.status_change.subscribe()
    }

    pub fn subscribe_data_read(&self) -> broadcast::Receiver<String> {
        self.data_read.subscribe()
    }

    pub fn subscribe_device_name(&self) -> broadcast::Receiver<String> {
        self.device_name.subscribe()
    }

    // Sending with no live receivers is not an error for a notification.

    pub fn emit_device_found(&self, device: Device) {
        debug!(address = %device.address, name = %device.name, "device found");
        let _ = self.device_found.send(device);
    }

    pub fn emit_status_change(&self, status: BluetoothStatus) {
        debug!(%status, "status change");
        let _ = self.status_change.send(status);
    }

    pub fn emit_data_read(&self, line: String) {
        let _ = self.data_read.send(line);
    }

    pub fn emit_device_name(&self, name: String) {
        let _ = self.device_name.send(name);
    }
}

/// Drain `rx` into `handler` on the current runtime until the channel closes.
///
/// The handler returns `false` to stop listening.
pub fn forward<T, F>(mut rx: broadcast::Receiver<T>, mut handler: F) -> JoinHandle<()>
where
    T: Clone + Send + 'static,
    F: FnMut(T) -> bool + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if !handler(event) {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Listener lagged, {} events dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Listener tasks that stop when this guard is dropped.
#[derive(Default)]
pub struct Subscriptions {
    tasks: Vec<JoinHandle<()>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn unsubscribe_all(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        self.unsubscribe_all();
    }
}
