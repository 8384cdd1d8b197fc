// src/tensor_data.rs
use std::fmt::Debug;
use std::sync::Arc;

use crate::autograd::BackwardOp;
use crate::device::StorageDevice;
use crate::error::RelpropError;
use crate::hooks::TensorHook;
use crate::tensor::Tensor;

/// Internal storage and metadata for a Tensor.
///
/// Holds the f32 data buffer (contiguous, row-major), the shape, the device
/// tag and the autograd state. It is wrapped in `Arc<RwLock<TensorData>>` by
/// `Tensor` to allow shared ownership and interior mutability.
#[derive(Debug)]
pub struct TensorData {
    /// The data buffer. Wrapped in Arc so detached views and cached
    /// activations share it without copying.
    pub(crate) data: Arc<Vec<f32>>,
    /// The shape (dimensions) of the tensor.
    pub(crate) shape: Vec<usize>,
    /// The device the tensor is attributed to.
    pub(crate) device: StorageDevice,

    // --- Autograd Metadata ---
    /// Flag indicating if the tensor requires gradient computation.
    pub(crate) requires_grad: bool,
    /// Gradient accumulated during backward. Only populated on leaves.
    pub(crate) grad: Option<Tensor>,
    /// The operation that produced this tensor. Leaf tensors have `None`.
    pub(crate) grad_fn: Option<Arc<dyn BackwardOp + Send + Sync>>,
    /// Gradient hooks, fired in registration order.
    pub(crate) hooks: Vec<TensorHook>,
}

impl TensorData {
    /// Creates a new `TensorData` with the given f32 data and shape.
    ///
    /// # Errors
    /// Returns `RelpropError::TensorCreationError` if the length of `data_vec`
    /// does not match the number of elements specified by `shape`.
    pub fn new(
        data_vec: Vec<f32>,
        shape: Vec<usize>,
        device: StorageDevice,
    ) -> Result<Self, RelpropError> {
        let numel: usize = shape.iter().product();
        let data_len = data_vec.len();
        if data_len != numel {
            return Err(RelpropError::TensorCreationError { data_len, shape });
        }
        Ok(TensorData {
            data: Arc::new(data_vec),
            shape,
            device,
            requires_grad: false,
            grad: None,
            grad_fn: None,
            hooks: Vec::new(),
        })
    }

    /// Creates a `TensorData` sharing an existing buffer. No autograd state.
    pub(crate) fn shared(data: Arc<Vec<f32>>, shape: Vec<usize>, device: StorageDevice) -> Self {
        TensorData {
            data,
            shape,
            device,
            requires_grad: false,
            grad: None,
            grad_fn: None,
            hooks: Vec::new(),
        }
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Calculates the row-major strides for `shape`.
    pub fn calculate_contiguous_strides(shape: &[usize]) -> Vec<usize> {
        let mut strides = vec![0; shape.len()];
        if shape.is_empty() {
            return strides;
        }
        strides[shape.len() - 1] = 1;
        for i in (0..shape.len() - 1).rev() {
            strides[i] = strides[i + 1] * shape[i + 1];
        }
        strides
    }
}
