use std::fmt::Debug;

/// Represents the location a tensor is attributed to.
///
/// Data always lives in host memory; the device is a placement tag that
/// keys per-device state (activation caches, relevance stores) the same way
/// a data-parallel run keys it by accelerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Default)]
pub enum StorageDevice {
    /// Main system memory. This is the default device.
    #[default]
    CPU,
    /// An accelerator, identified by its ordinal.
    GPU(usize),
}

impl StorageDevice {
    pub fn is_cpu(&self) -> bool {
        matches!(self, StorageDevice::CPU)
    }
}
