//! Connection status shared between a backend and its event callbacks.

use crate::domain::models::BluetoothStatus;
use crate::infrastructure::bluetooth::events::EventHub;
use std::sync::{Arc, Mutex, PoisonError};

/// Last known connection status. Clones share the same value, so a status
/// reported from a platform callback is what `status()` answers afterwards.
#[derive(Debug, Clone)]
pub struct StatusCell {
    status: Arc<Mutex<BluetoothStatus>>,
    events: EventHub,
}

impl StatusCell {
    pub fn new(events: EventHub) -> Self {
        Self {
            status: Arc::new(Mutex::new(BluetoothStatus::default())),
            events,
        }
    }

    pub fn get(&self) -> BluetoothStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `status` and emit "status change" if it differs from the
    /// current value. Returns whether it changed.
    pub fn set(&self, status: BluetoothStatus) -> bool {
        let mut current = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        if *current == status {
            return false;
        }
        *current = status;
        self.events.emit_status_change(status);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_update_is_visible_to_owner() {
        let events = EventHub::default();
        let mut rx = events.subscribe_status_change();
        let owner = StatusCell::new(events);
        let callback = owner.clone();

        assert!(owner.set(BluetoothStatus::Connecting));
        // The platform reports the link came up on its own thread.
        assert!(callback.set(BluetoothStatus::Connected));
        assert_eq!(owner.get(), BluetoothStatus::Connected);

        // Re-confirming the same state from the owner is silent.
        assert!(!owner.set(BluetoothStatus::Connected));

        assert_eq!(rx.try_recv().unwrap(), BluetoothStatus::Connecting);
        assert_eq!(rx.try_recv().unwrap(), BluetoothStatus::Connected);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_starts_disconnected() {
        let cell = StatusCell::new(EventHub::default());
        assert_eq!(cell.get(), BluetoothStatus::None);
        assert!(!cell.set(BluetoothStatus::None));
    }
}
