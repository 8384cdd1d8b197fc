use crate::autograd::BackwardOp;
use crate::error::RelpropError;
use crate::ops::elementwise::map;
use crate::ops::zip_with;
use crate::tensor::Tensor;
use std::sync::Arc;

#[derive(Debug)]
struct ReluBackward {
    input: Tensor,
    // Forward-time values; the mask must not follow later in-place rewrites.
    input_saved: Tensor,
}

impl BackwardOp for ReluBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, RelpropError> {
        // grad = upstream_grad * (input > 0)
        let grad = zip_with(grad_output, &self.input_saved, |g, x| if x > 0.0 { g } else { 0.0 })?;
        Ok(vec![grad])
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.input.clone()]
    }
}

/// Applies the Rectified Linear Unit element-wise: ReLU(x) = max(0, x).
pub fn relu_op(input: &Tensor) -> Result<Tensor, RelpropError> {
    let result = map(input, |x| x.max(0.0))?;
    if input.requires_grad() {
        result.set_grad_fn(Arc::new(ReluBackward {
            input: input.clone(),
            input_saved: input.detach(),
        }));
    }
    Ok(result)
}
