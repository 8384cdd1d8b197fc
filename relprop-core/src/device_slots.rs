use crate::device::StorageDevice;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// Thread-safe map from `StorageDevice` to an independently locked slot.
///
/// The outer `RwLock` only guards the device -> slot table and is held for
/// the lookup; the value itself sits behind a per-device `Mutex`. Two writers
/// on the same device serialize on that device's slot, writers on different
/// devices never wait on each other's slot.
pub struct DeviceSlots<T> {
    slots: RwLock<HashMap<StorageDevice, Arc<Mutex<Option<T>>>>>,
}

impl<T> DeviceSlots<T> {
    pub fn new() -> Self {
        DeviceSlots {
            slots: RwLock::new(HashMap::new()),
        }
    }

    fn slot(&self, device: StorageDevice) -> Arc<Mutex<Option<T>>> {
        {
            let guard = self.slots.read().unwrap_or_else(|poisoned| {
                log::warn!("RwLock for device slots was poisoned on read. Recovering.");
                poisoned.into_inner()
            });
            if let Some(slot) = guard.get(&device) {
                return Arc::clone(slot);
            }
        }
        let mut guard = self.slots.write().unwrap_or_else(|poisoned| {
            log::warn!("RwLock for device slots was poisoned on write. Recovering.");
            poisoned.into_inner()
        });
        Arc::clone(
            guard
                .entry(device)
                .or_insert_with(|| Arc::new(Mutex::new(None))),
        )
    }

    fn lock(slot: &Mutex<Option<T>>) -> MutexGuard<'_, Option<T>> {
        slot.lock().unwrap_or_else(|poisoned| {
            log::warn!("Mutex for a device slot was poisoned. Recovering.");
            poisoned.into_inner()
        })
    }

    /// Runs `f` with exclusive access to the device's slot.
    pub fn with_mut<R>(&self, device: StorageDevice, f: impl FnOnce(&mut Option<T>) -> R) -> R {
        let slot = self.slot(device);
        let mut guard = Self::lock(&slot);
        f(&mut guard)
    }

    /// Stores `value` for `device`, returning the previous value.
    pub fn set(&self, device: StorageDevice, value: T) -> Option<T> {
        self.with_mut(device, |slot| slot.replace(value))
    }

    /// Stores `value` only if the slot is empty. Gives the value back otherwise.
    pub fn try_insert(&self, device: StorageDevice, value: T) -> Result<(), T> {
        self.with_mut(device, |slot| {
            if slot.is_some() {
                Err(value)
            } else {
                *slot = Some(value);
                Ok(())
            }
        })
    }

    pub fn take(&self, device: StorageDevice) -> Option<T> {
        self.with_mut(device, |slot| slot.take())
    }

    pub fn contains(&self, device: StorageDevice) -> bool {
        let slot = {
            let guard = self.slots.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            match guard.get(&device) {
                Some(slot) => Arc::clone(slot),
                None => return false,
            }
        };
        let filled = Self::lock(&slot).is_some();
        filled
    }

    /// Devices whose slot currently holds a value, in device order.
    pub fn devices(&self) -> Vec<StorageDevice> {
        let guard = self.slots.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut devices: Vec<StorageDevice> = guard
            .iter()
            .filter(|(_, slot)| Self::lock(slot).is_some())
            .map(|(device, _)| *device)
            .collect();
        devices.sort();
        devices
    }

    pub fn clear(&self) {
        let mut guard = self.slots.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.clear();
    }
}

impl<T: Clone> DeviceSlots<T> {
    pub fn get(&self, device: StorageDevice) -> Option<T> {
        self.with_mut(device, |slot| slot.clone())
    }
}

impl<T> Default for DeviceSlots<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for DeviceSlots<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSlots")
            .field("devices", &self.devices())
            .finish()
    }
}

#[cfg(test)]
#[path = "device_slots_test.rs"]
mod tests;
