//! Bookkeeping for the device set returned by `start_scan`.
//!
//! A session collects every discovery between `begin` and `finish`; the
//! caller of `start_scan` waits on the receiver returned by `begin`. Each
//! session carries an id so a scanner that was replaced can only touch the
//! session it was started for.

use crate::domain::models::Device;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionId(u64);

struct Session {
    id: SessionId,
    found: Vec<Device>,
    waiter: oneshot::Sender<Vec<Device>>,
}

#[derive(Default)]
pub struct ScanSessions {
    current: Option<Session>,
    next_id: u64,
}

impl ScanSessions {
    /// Open a session, resolving any previous one first.
    pub fn begin(&mut self) -> (SessionId, oneshot::Receiver<Vec<Device>>) {
        self.finish();
        self.next_id += 1;
        let id = SessionId(self.next_id);
        let (waiter, rx) = oneshot::channel();
        self.current = Some(Session {
            id,
            found: Vec::new(),
            waiter,
        });
        (id, rx)
    }

    /// Record a discovery for session `id`. Returns `false` once that
    /// session is no longer the open one.
    pub fn record(&mut self, id: SessionId, device: &Device) -> bool {
        match &mut self.current {
            Some(session) if session.id == id => {
                session.found.push(device.clone());
                true
            }
            _ => false,
        }
    }

    /// Resolve the open session, if any. Returns whether one was open.
    pub fn finish(&mut self) -> bool {
        match self.current.take() {
            Some(session) => {
                // The caller may have given up on the scan result.
                let _ = session.waiter.send(session.found);
                true
            }
            None => false,
        }
    }

    /// Resolve session `id` only if it is still the open one.
    pub fn finish_session(&mut self, id: SessionId) -> bool {
        match &self.current {
            Some(session) if session.id == id => self.finish(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_resolves_with_recorded_devices() {
        let mut sessions = ScanSessions::default();

        let (id, rx) = sessions.begin();
        assert!(sessions.record(id, &Device::new("00:00:00:00:00:02", "A")));
        assert!(sessions.record(id, &Device::new("00:00:00:00:00:03", "B")));
        assert!(sessions.finish());
        assert!(!sessions.finish());
        assert!(!sessions.record(id, &Device::new("00:00:00:00:00:04", "late")));

        let found = rx.await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "A");
    }

    #[tokio::test]
    async fn test_begin_resolves_previous_session() {
        let mut sessions = ScanSessions::default();
        let (first_id, first) = sessions.begin();
        sessions.record(first_id, &Device::new("00:00:00:00:00:01", "A"));
        let (second_id, _second) = sessions.begin();

        assert_ne!(first_id, second_id);
        assert_eq!(first.await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replaced_scanner_cannot_end_new_session() {
        let mut sessions = ScanSessions::default();
        let (old_id, _old) = sessions.begin();
        let (new_id, mut rx) = sessions.begin();

        // The replaced watcher reports late: its discovery and its
        // "stopped" notification must both be ignored.
        assert!(!sessions.record(old_id, &Device::new("00:00:00:00:00:01", "stale")));
        assert!(!sessions.finish_session(old_id));
        assert!(rx.try_recv().is_err());

        sessions.record(new_id, &Device::new("00:00:00:00:00:02", "fresh"));
        assert!(sessions.finish_session(new_id));
        let found = rx.await.unwrap();
        assert_eq!(found, vec![Device::new("00:00:00:00:00:02", "fresh")]);
    }
}
