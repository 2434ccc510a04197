// ── Device inventory ──
//
// Devices found by the current scan plus the warnings raised while
// collecting them. Cleared when a new scan starts or authorization lapses.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{DUPLICATE_ID, DUPLICATE_ID_MESSAGE, Device, DeviceKey, Warnings};

/// Outcome of offering a device to the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Announced {
    Added,
    /// Same id and address as a known device.
    Duplicate,
    /// Same id as a known device at another address; recorded as a warning.
    Conflict,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Inventory {
    devices: Vec<Device>,
    warnings: Warnings,
}

impl Inventory {
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn warnings(&self) -> &Warnings {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn device(&self, key: &DeviceKey) -> Option<&Device> {
        self.devices.iter().find(|d| d.matches(key))
    }

    pub fn device_mut(&mut self, key: &DeviceKey) -> Option<&mut Device> {
        self.devices.iter_mut().find(|d| d.matches(key))
    }

    /// Add a device unless one with the same id is already known.
    pub fn announce(&mut self, device: Device) -> Announced {
        match self.devices.iter().find(|d| d.id == device.id) {
            None => {
                debug!(device = %device.key(), "device added");
                self.devices.push(device);
                Announced::Added
            }
            Some(known) if known.address == device.address => Announced::Duplicate,
            Some(known) => {
                warn!(
                    device_id = %device.id,
                    known = %known.address,
                    announced = %device.address,
                    "conflicting device id"
                );
                self.warnings
                    .push(DUPLICATE_ID, DUPLICATE_ID_MESSAGE, device.id);
                Announced::Conflict
            }
        }
    }

    /// Add a device by hand. An exact duplicate is rejected.
    pub fn add_device(&mut self, device: Device) -> Result<Announced, CoreError> {
        if self.device(&device.key()).is_some() {
            return Err(CoreError::validation(format!(
                "Device {} is already in the list.",
                device.key()
            )));
        }
        Ok(self.announce(device))
    }

    pub fn clear(&mut self) {
        self.devices.clear();
        self.warnings.clear();
    }
}
