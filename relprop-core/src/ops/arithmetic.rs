use crate::autograd::BackwardOp;
use crate::error::RelpropError;
use crate::ops::{check_same_layout, zip_with};
use crate::tensor::Tensor;
use std::sync::Arc;

// --- Add ---

#[derive(Debug)]
struct AddBackward {
    a: Tensor,
    b: Tensor,
}

impl BackwardOp for AddBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, RelpropError> {
        // d(a+b)/da = d(a+b)/db = 1
        Ok(vec![grad_output.detach(), grad_output.detach()])
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone(), self.b.clone()]
    }
}

/// Element-wise addition of two tensors of identical shape and device.
pub fn add_op(a: &Tensor, b: &Tensor) -> Result<Tensor, RelpropError> {
    check_same_layout(a, b, "add_op")?;
    let result = zip_with(a, b, |x, y| x + y)?;
    if a.requires_grad() || b.requires_grad() {
        result.set_grad_fn(Arc::new(AddBackward {
            a: a.clone(),
            b: b.clone(),
        }));
    }
    Ok(result)
}

// --- Mul ---

#[derive(Debug)]
struct MulBackward {
    a: Tensor,
    b: Tensor,
    // Values as seen by the forward pass; inputs may be rewritten in place later.
    a_saved: Tensor,
    b_saved: Tensor,
}

impl BackwardOp for MulBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, RelpropError> {
        let grad_a = zip_with(grad_output, &self.b_saved, |g, b| g * b)?;
        let grad_b = zip_with(grad_output, &self.a_saved, |g, a| g * a)?;
        Ok(vec![grad_a, grad_b])
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone(), self.b.clone()]
    }
}

/// Element-wise multiplication of two tensors of identical shape and device.
pub fn mul_op(a: &Tensor, b: &Tensor) -> Result<Tensor, RelpropError> {
    check_same_layout(a, b, "mul_op")?;
    let result = zip_with(a, b, |x, y| x * y)?;
    if a.requires_grad() || b.requires_grad() {
        result.set_grad_fn(Arc::new(MulBackward {
            a: a.clone(),
            b: b.clone(),
            a_saved: a.detach(),
            b_saved: b.detach(),
        }));
    }
    Ok(result)
}

#[cfg(test)]
#[path = "arithmetic_test.rs"]
mod tests;
