// src/tensor/autograd.rs

use crate::{
    autograd::{graph::run_backward, BackwardOp},
    error::RelpropError,
    tensor::Tensor,
    tensor_data::TensorData,
};
use std::sync::Arc;

impl Tensor {
    /// Checks if the tensor requires gradient computation.
    pub fn requires_grad(&self) -> bool {
        self.read_data().requires_grad
    }

    /// Sets the `requires_grad` status of this tensor **in-place**.
    /// Only allowed on leaf tensors.
    pub fn requires_grad_(&self, requires_grad: bool) -> Result<(), RelpropError> {
        let mut guard = self.write_data();
        if guard.grad_fn.is_some() {
            return Err(RelpropError::RequiresGradOnNonLeaf);
        }
        guard.requires_grad = requires_grad;
        Ok(())
    }

    /// Returns the backward node that produced this tensor, if any.
    pub fn grad_fn(&self) -> Option<Arc<dyn BackwardOp + Send + Sync>> {
        self.read_data().grad_fn.clone()
    }

    /// Attaches `grad_fn` and marks the tensor as requiring grad.
    pub(crate) fn set_grad_fn(&self, grad_fn: Arc<dyn BackwardOp + Send + Sync>) {
        let mut guard = self.write_data();
        guard.requires_grad = true;
        guard.grad_fn = Some(grad_fn);
    }

    /// Returns the accumulated gradient, if any.
    pub fn grad(&self) -> Option<Tensor> {
        self.read_data().grad.clone()
    }

    /// Overwrites the stored gradient, e.g. to put back a saved one.
    pub fn set_grad(&self, grad: Option<Tensor>) {
        self.write_data().grad = grad;
    }

    /// Resets the gradient of this tensor to None.
    pub fn zero_grad(&self) {
        self.write_data().grad = None;
    }

    /// Accumulates `grad_to_add` into the tensor's `grad` field.
    pub(crate) fn acc_grad(&self, grad_to_add: Tensor) -> Result<(), RelpropError> {
        let (shape, device) = {
            let guard = self.read_data();
            (guard.shape.clone(), guard.device)
        };
        if grad_to_add.shape() != shape {
            return Err(RelpropError::GradientAccumulationShapeMismatch {
                expected: shape,
                actual: grad_to_add.shape(),
            });
        }
        if grad_to_add.device() != device {
            return Err(RelpropError::DeviceMismatch {
                expected: device,
                actual: grad_to_add.device(),
                operation: "acc_grad".to_string(),
            });
        }
        let existing = self.write_data().grad.take();
        let new_grad = match existing {
            Some(existing_grad) => {
                let summed: Vec<f32> = existing_grad
                    .buffer()
                    .iter()
                    .zip(grad_to_add.buffer().iter())
                    .map(|(a, b)| a + b)
                    .collect();
                Tensor::new_on(summed, shape, device)?
            }
            None => grad_to_add.detach(),
        };
        self.write_data().grad = Some(new_grad);
        Ok(())
    }

    /// Creates a new tensor that shares the same data but is detached
    /// from the computation graph.
    pub fn detach(&self) -> Tensor {
        let guard = self.read_data();
        Tensor::from_data(TensorData::shared(
            Arc::clone(&guard.data),
            guard.shape.clone(),
            guard.device,
        ))
    }

    /// Computes the gradients of this scalar tensor w.r.t. graph leaves.
    pub fn backward(&self) -> Result<(), RelpropError> {
        if self.numel() != 1 {
            return Err(RelpropError::BackwardNonScalar);
        }
        let seed = crate::tensor::ones_like(self)?;
        self.backward_with_grad(seed)
    }

    /// Runs the backward pass from this tensor with an explicit seed gradient.
    pub fn backward_with_grad(&self, grad: Tensor) -> Result<(), RelpropError> {
        if !self.requires_grad() {
            return Err(RelpropError::RequiresGradNotMet);
        }
        if grad.shape() != self.shape() {
            return Err(RelpropError::ShapeMismatch {
                expected: self.shape(),
                actual: grad.shape(),
                operation: "backward_with_grad".to_string(),
            });
        }
        run_backward(self, grad)
    }
}
