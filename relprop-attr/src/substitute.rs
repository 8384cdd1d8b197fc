use relprop_core::{NodeId, StorageDevice, Tensor};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Pending gradient substitutes, keyed by the graph node they belong to.
///
/// Two independently fired callbacks may touch the same tensor during
/// backward: a relevance-input hook on the tensor and the backward hook of
/// the activation layer that produced it. The first leaves its relevance here
/// and the second consumes it instead of the raw gradient.
#[derive(Debug, Default)]
pub struct SubstituteSlots {
    pending: Mutex<HashMap<NodeId, Tensor>>,
}

impl SubstituteSlots {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<NodeId, Tensor>> {
        self.pending.lock().unwrap_or_else(|poisoned| {
            log::warn!("Mutex for substitute slots was poisoned. Recovering.");
            poisoned.into_inner()
        })
    }

    /// Leaves `value` for `node`, replacing any earlier one.
    pub fn insert(&self, node: NodeId, value: Tensor) -> Option<Tensor> {
        self.lock().insert(node, value)
    }

    /// Consumes the value pending for `node`.
    pub fn take(&self, node: NodeId) -> Option<Tensor> {
        self.lock().remove(&node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.lock().contains_key(&node)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drops every pending value that lives on `device`.
    pub fn clear_device(&self, device: StorageDevice) {
        self.lock().retain(|_, value| value.device() != device);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_consumes() {
        let slots = SubstituteSlots::new();
        let a = Tensor::new(vec![1.0], vec![1]).unwrap();
        let b = Tensor::new(vec![2.0], vec![1]).unwrap();
        assert!(slots.insert(a.node_id(), b.clone()).is_none());
        assert!(slots.contains(a.node_id()));
        assert!(!slots.contains(b.node_id()));
        assert_eq!(slots.take(a.node_id()), Some(b));
        assert!(slots.take(a.node_id()).is_none());
        assert!(slots.is_empty());
    }

    #[test]
    fn test_clear_device_only_drops_that_device() {
        let slots = SubstituteSlots::new();
        let cpu = Tensor::new(vec![1.0], vec![1]).unwrap();
        let gpu = Tensor::new_on(vec![1.0], vec![1], StorageDevice::GPU(0)).unwrap();
        slots.insert(cpu.node_id(), cpu.clone());
        slots.insert(gpu.node_id(), gpu.clone());
        slots.clear_device(StorageDevice::CPU);
        assert_eq!(slots.len(), 1);
        assert!(slots.contains(gpu.node_id()));
        slots.clear();
        assert!(slots.is_empty());
    }
}
