use crate::error::RelpropError;
use crate::tensor::Tensor;
use std::fmt::Debug;

/// Defines the interface for the backward pass of a differentiable tensor operation.
///
/// Any operation that creates a non-leaf `Tensor` stores an implementation in the
/// output's `grad_fn` field. The backward engine calls it with the gradient flowing
/// into the output and routes the returned gradients to [`BackwardOp::inputs`].
///
/// The trait requires `Debug + Send + Sync` because the `Arc<dyn BackwardOp>` may be
/// shared between threads that run attribution on different devices.
pub trait BackwardOp: Debug + Send + Sync {
    /// Computes \( \frac{dL}{d\text{Input}_i} \) for each input given
    /// \( \frac{dL}{d\text{Output}} \) (`grad_output`).
    ///
    /// # Returns
    /// * `Ok(Vec<Tensor>)`: one gradient per input. The order **must** match
    ///   [`BackwardOp::inputs`] and each gradient has its input's shape and device.
    /// * `Err(RelpropError)`: on shape or device mismatch.
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, RelpropError>;

    /// Returns the input tensors that participated in the forward operation.
    ///
    /// Holding the inputs keeps their graph nodes alive for the backward pass.
    fn inputs(&self) -> Vec<Tensor>;
}
