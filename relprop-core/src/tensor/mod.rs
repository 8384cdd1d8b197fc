// src/tensor/mod.rs

use crate::autograd::graph::NodeId;
use crate::device::StorageDevice;
use crate::error::RelpropError;
use crate::tensor_data::TensorData;
use std::fmt;
use std::sync::{Arc, RwLock};

mod autograd;
pub mod create;
mod hooks;

pub use create::{full, ones, ones_like, randn, uniform, zeros, zeros_like};

/// Represents a multi-dimensional array (tensor) of f32 values.
///
/// `Tensor` uses `Arc<RwLock<TensorData>>` internally to allow for:
/// 1.  **Shared Ownership:** clones are cheap and point to the same graph node.
/// 2.  **Interior Mutability:** autograd metadata, hooks and even the data
///     buffer (see [`Tensor::set_data`]) can be changed through `&Tensor`.
pub struct Tensor {
    pub(crate) data: Arc<RwLock<TensorData>>,
}

impl Tensor {
    /// Creates a new CPU tensor with the given f32 data and shape.
    pub fn new(data_vec: Vec<f32>, shape: Vec<usize>) -> Result<Self, RelpropError> {
        Self::new_on(data_vec, shape, StorageDevice::CPU)
    }

    /// Creates a new tensor attributed to `device`.
    pub fn new_on(
        data_vec: Vec<f32>,
        shape: Vec<usize>,
        device: StorageDevice,
    ) -> Result<Self, RelpropError> {
        let tensor_data = TensorData::new(data_vec, shape, device)?;
        Ok(Self::from_data(tensor_data))
    }

    pub(crate) fn from_data(tensor_data: TensorData) -> Self {
        Tensor {
            data: Arc::new(RwLock::new(tensor_data)),
        }
    }

    /// Creates a new CPU tensor from a Vec<f32> and shape.
    pub fn from_vec_f32(data_vec: Vec<f32>, shape: Vec<usize>) -> Result<Self, RelpropError> {
        Tensor::new(data_vec, shape)
    }

    /// Returns the device the tensor is attributed to.
    pub fn device(&self) -> StorageDevice {
        self.read_data().device
    }

    /// Returns a clone of the tensor's shape.
    pub fn shape(&self) -> Vec<usize> {
        self.read_data().shape.clone()
    }

    /// Returns the number of elements in the tensor.
    pub fn numel(&self) -> usize {
        self.read_data().numel()
    }

    /// Identity of this tensor's graph node. Stable across clones.
    pub fn node_id(&self) -> NodeId {
        NodeId::of(&self.data)
    }

    /// Acquires a read lock on the tensor's data.
    /// Panics if the RwLock is poisoned.
    pub fn read_data(&self) -> std::sync::RwLockReadGuard<'_, TensorData> {
        self.data.read().expect("RwLock poisoned")
    }

    /// Acquires a write lock on the tensor's data.
    /// Panics if the RwLock is poisoned.
    pub fn write_data(&self) -> std::sync::RwLockWriteGuard<'_, TensorData> {
        self.data.write().expect("RwLock poisoned")
    }

    /// Returns a copy of the tensor data.
    pub fn get_f32_data(&self) -> Result<Vec<f32>, RelpropError> {
        Ok(self.read_data().data.as_ref().clone())
    }

    /// Shared handle on the data buffer, without copying.
    pub(crate) fn buffer(&self) -> Arc<Vec<f32>> {
        Arc::clone(&self.read_data().data)
    }

    /// Returns the single value of a one-element tensor.
    pub fn item(&self) -> Result<f32, RelpropError> {
        let guard = self.read_data();
        if guard.numel() != 1 {
            return Err(RelpropError::ShapeMismatch {
                expected: vec![1],
                actual: guard.shape.clone(),
                operation: "item".to_string(),
            });
        }
        Ok(guard.data[0])
    }

    /// Reads one element by multi-dimensional index.
    pub fn at(&self, index: &[usize]) -> Result<f32, RelpropError> {
        let guard = self.read_data();
        let out_of_bounds = index.len() != guard.shape.len()
            || index.iter().zip(guard.shape.iter()).any(|(i, d)| i >= d);
        if out_of_bounds {
            return Err(RelpropError::IndexOutOfBounds {
                index: index.to_vec(),
                shape: guard.shape.clone(),
            });
        }
        let strides = TensorData::calculate_contiguous_strides(&guard.shape);
        let offset: usize = index.iter().zip(strides.iter()).map(|(i, s)| i * s).sum();
        Ok(guard.data[offset])
    }

    /// Replaces the data buffer in place, keeping the graph node, hooks and
    /// autograd state. The shape must not change.
    pub fn set_data(&self, values: Vec<f32>) -> Result<(), RelpropError> {
        let mut guard = self.write_data();
        if values.len() != guard.numel() {
            return Err(RelpropError::TensorCreationError {
                data_len: values.len(),
                shape: guard.shape.clone(),
            });
        }
        guard.data = Arc::new(values);
        Ok(())
    }

    /// Makes this tensor share `source`'s buffer. Shapes must match.
    pub fn set_data_from(&self, source: &Tensor) -> Result<(), RelpropError> {
        if Arc::ptr_eq(&self.data, &source.data) {
            return Ok(());
        }
        let (buffer, source_shape) = {
            let src = source.read_data();
            (Arc::clone(&src.data), src.shape.clone())
        };
        let mut guard = self.write_data();
        if guard.shape != source_shape {
            return Err(RelpropError::ShapeMismatch {
                expected: guard.shape.clone(),
                actual: source_shape,
                operation: "set_data_from".to_string(),
            });
        }
        guard.data = buffer;
        Ok(())
    }

    /// Returns a detached tensor with the same values attributed to `device`.
    pub fn to_device(&self, device: StorageDevice) -> Tensor {
        let guard = self.read_data();
        Tensor::from_data(TensorData::shared(
            Arc::clone(&guard.data),
            guard.shape.clone(),
            device,
        ))
    }
}

// Manual implementation of Clone: clones the Arc, not the TensorData.
impl Clone for Tensor {
    fn clone(&self) -> Self {
        Tensor {
            data: Arc::clone(&self.data),
        }
    }
}

/// Two tensors are equal when shape, device and values match.
impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.data, &other.data) {
            return true;
        }
        let a = self.read_data();
        let b = other.read_data();
        a.shape == b.shape && a.device == b.device && a.data == b.data
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.read_data();
        f.debug_struct("Tensor")
            .field("shape", &guard.shape)
            .field("device", &guard.device)
            .field("requires_grad", &guard.requires_grad)
            .field("has_grad_fn", &guard.grad_fn.is_some())
            .field("data", &guard.data)
            .finish()
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
