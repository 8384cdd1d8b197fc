use crate::autograd::BackwardOp;
use crate::error::RelpropError;
use crate::tensor::Tensor;
use std::sync::Arc;

#[derive(Debug)]
struct SumBackward {
    input: Tensor,
    input_shape: Vec<usize>,
}

impl BackwardOp for SumBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, RelpropError> {
        let g = grad_output.item()?;
        let numel: usize = self.input_shape.iter().product();
        let grad = Tensor::new_on(vec![g; numel], self.input_shape.clone(), grad_output.device())?;
        Ok(vec![grad])
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.input.clone()]
    }
}

/// Sums every element into a tensor of shape `[1]`.
pub fn sum_op(input: &Tensor) -> Result<Tensor, RelpropError> {
    let total: f32 = input.buffer().iter().sum();
    let result = Tensor::new_on(vec![total], vec![1], input.device())?;
    if input.requires_grad() {
        result.set_grad_fn(Arc::new(SumBackward {
            input: input.clone(),
            input_shape: input.shape(),
        }));
    }
    Ok(result)
}

/// Sums the trailing dimensions of a `[batch, ...]` tensor, one value per row.
/// Not tracked by autograd.
pub fn sum_rows(input: &Tensor) -> Result<Vec<f32>, RelpropError> {
    let shape = input.shape();
    let batch = *shape.first().ok_or_else(|| {
        RelpropError::UnsupportedOperation("sum_rows requires at least one dimension".to_string())
    })?;
    let data = input.buffer();
    if batch == 0 {
        return Ok(Vec::new());
    }
    let row_len = data.len() / batch;
    Ok(data.chunks(row_len.max(1)).map(|row| row.iter().sum()).collect())
}
