// src/ops/mod.rs
// Differentiable operations. Each `*_op` function computes its forward
// result and, when any input requires grad, attaches its `BackwardOp`.

pub mod activation;
pub mod arithmetic;
pub mod copy;
pub mod elementwise;
pub mod linear;
pub mod normalization;
pub mod reduction;

pub use activation::relu_op;
pub use arithmetic::{add_op, mul_op};
pub use copy::copy_op;
pub use elementwise::zip_with;
pub use linear::linear_op;
pub use normalization::batch_norm_op;
pub use reduction::sum_op;

use crate::error::RelpropError;
use crate::tensor::Tensor;

/// Checks that two operands share shape and device.
pub(crate) fn check_same_layout(a: &Tensor, b: &Tensor, operation: &str) -> Result<(), RelpropError> {
    if a.device() != b.device() {
        return Err(RelpropError::DeviceMismatch {
            expected: a.device(),
            actual: b.device(),
            operation: operation.to_string(),
        });
    }
    if a.shape() != b.shape() {
        return Err(RelpropError::ShapeMismatch {
            expected: a.shape(),
            actual: b.shape(),
            operation: operation.to_string(),
        });
    }
    Ok(())
}
