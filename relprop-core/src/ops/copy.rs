use crate::autograd::BackwardOp;
use crate::error::RelpropError;
use crate::tensor::Tensor;
use std::sync::Arc;

#[derive(Debug)]
struct CopyBackward {
    input: Tensor,
}

impl BackwardOp for CopyBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, RelpropError> {
        Ok(vec![grad_output.detach()])
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.input.clone()]
    }
}

/// Copies `input` into a fresh buffer. Gradients flow back unchanged.
pub fn copy_op(input: &Tensor) -> Result<Tensor, RelpropError> {
    let result = Tensor::new_on(input.get_f32_data()?, input.shape(), input.device())?;
    if input.requires_grad() {
        result.set_grad_fn(Arc::new(CopyBackward {
            input: input.clone(),
        }));
    }
    Ok(result)
}

impl Tensor {
    /// Tracked copy with its own buffer and graph node.
    ///
    /// Rewriting the copy in place (see [`Tensor::set_data`]) leaves the
    /// original untouched, while gradients still reach the original.
    pub fn duplicate(&self) -> Result<Tensor, RelpropError> {
        copy_op(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::sum_op;
    use crate::utils::testing::create_test_tensor_with_grad;

    #[test]
    fn test_duplicate_is_independent_but_tracked() -> Result<(), RelpropError> {
        let a = create_test_tensor_with_grad(vec![1.0, 2.0], vec![2]);
        let copy = a.duplicate()?;
        assert_ne!(copy.node_id(), a.node_id());
        copy.set_data(vec![9.0, 9.0])?;
        assert_eq!(a.get_f32_data()?, vec![1.0, 2.0]);

        sum_op(&copy)?.backward()?;
        assert_eq!(a.grad().expect("grad").get_f32_data()?, vec![1.0, 1.0]);
        Ok(())
    }
}
