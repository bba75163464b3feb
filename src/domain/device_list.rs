//! Render model for the discovered-device list.
//!
//! The model is never edited in place: every accepted device produces a new
//! [`DeviceList`] built with [`DeviceList::clone_with_rows`], which records
//! the rows that differ from the previous model so the view knows whether a
//! repaint is needed.

use crate::domain::models::Device;

/// Value-based row comparison over the comparable fields of a device.
pub fn row_has_changed(previous: &Device, current: &Device) -> bool {
    previous.address != current.address || previous.name != current.name
}

/// Index of the first device with the given address.
pub fn position_by_address(devices: &[Device], address: &str) -> Option<usize> {
    devices.iter().position(|d| d.address == address)
}

#[derive(Debug, Clone, Default)]
pub struct DeviceList {
    rows: Vec<Device>,
    changed_rows: Vec<usize>,
    generation: u64,
}

impl DeviceList {
    /// Build the next model from `rows`, diffing against `self`.
    pub fn clone_with_rows(&self, rows: &[Device]) -> Self {
        let changed_rows = rows
            .iter()
            .enumerate()
            .filter(|(i, row)| match self.rows.get(*i) {
                Some(previous) => row_has_changed(previous, row),
                None => true,
            })
            .map(|(i, _)| i)
            .collect();

        Self {
            rows: rows.to_vec(),
            changed_rows,
            generation: self.generation + 1,
        }
    }

    pub fn rows(&self) -> &[Device] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows that differ from the model this one was cloned from.
    pub fn changed_rows(&self) -> &[usize] {
        &self.changed_rows
    }

    #[cfg(test)]
    pub fn has_changes(&self) -> bool {
        !self.changed_rows.is_empty()
    }

    /// Bumped once per regeneration.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_with_rows_marks_new_rows() {
        let empty = DeviceList::default();
        let rows = vec![Device::new("AA:BB", "Foo")];
        let next = empty.clone_with_rows(&rows);

        assert_eq!(next.rows(), rows.as_slice());
        assert_eq!(next.changed_rows(), &[0]);
        assert!(next.has_changes());
        assert_eq!(next.generation(), 1);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_clone_with_rows_keeps_unchanged_rows_clean() {
        let first = DeviceList::default().clone_with_rows(&[Device::new("AA:BB", "Foo")]);
        let second = first.clone_with_rows(&[
            Device::new("AA:BB", "Foo"),
            Device::new("CC:DD", "Bar"),
        ]);

        assert_eq!(second.changed_rows(), &[1]);
        assert_eq!(second.generation(), 2);
    }

    #[test]
    fn test_row_comparison_is_by_value() {
        let a = Device::new("AA:BB", "Foo");
        assert!(!row_has_changed(&a, &a.clone()));
        assert!(row_has_changed(&a, &Device::new("AA:BB", "Baz")));
        assert!(row_has_changed(&a, &Device::new("AA:BC", "Foo")));
    }

    #[test]
    fn test_position_by_address_first_match() {
        let devices = vec![
            Device::new("AA:BB", "Foo"),
            Device::new("CC:DD", "Bar"),
        ];
        assert_eq!(position_by_address(&devices, "CC:DD"), Some(1));
        assert_eq!(position_by_address(&devices, "EE:FF"), None);
    }
}
