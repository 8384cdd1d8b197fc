use crate::autograd::BackwardOp;
use crate::error::RelpropError;
use crate::tensor::Tensor;
use std::sync::Arc;

/// Backward of inference-mode batch normalization over `[B, F]`.
#[derive(Debug)]
struct BatchNormBackward {
    input: Tensor,
    weight: Option<Tensor>,
    bias: Option<Tensor>,
    // (x - mean) / sqrt(var + eps), per element
    normalized: Vec<f32>,
    // gamma / sqrt(var + eps), per feature
    scale: Vec<f32>,
    batch: usize,
    features: usize,
}

impl BackwardOp for BatchNormBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, RelpropError> {
        let (b, f) = (self.batch, self.features);
        let device = grad_output.device();
        let g = grad_output.buffer();

        let grad_input: Vec<f32> = g
            .iter()
            .enumerate()
            .map(|(idx, gv)| gv * self.scale[idx % f])
            .collect();
        let mut grads = vec![Tensor::new_on(grad_input, vec![b, f], device)?];

        if self.weight.is_some() {
            let mut grad_weight = vec![0.0f32; f];
            for (idx, gv) in g.iter().enumerate() {
                grad_weight[idx % f] += gv * self.normalized[idx];
            }
            grads.push(Tensor::new_on(grad_weight, vec![f], device)?);
        }
        if self.bias.is_some() {
            let mut grad_bias = vec![0.0f32; f];
            for (idx, gv) in g.iter().enumerate() {
                grad_bias[idx % f] += gv;
            }
            grads.push(Tensor::new_on(grad_bias, vec![f], device)?);
        }
        Ok(grads)
    }

    fn inputs(&self) -> Vec<Tensor> {
        let mut inputs = vec![self.input.clone()];
        inputs.extend(self.weight.iter().cloned());
        inputs.extend(self.bias.iter().cloned());
        inputs
    }
}

/// Normalizes `[batch, features]` input with fixed running statistics:
/// `y = (x - mean) / sqrt(var + eps) * weight + bias`.
pub fn batch_norm_op(
    input: &Tensor,
    weight: Option<&Tensor>,
    bias: Option<&Tensor>,
    running_mean: &[f32],
    running_var: &[f32],
    eps: f32,
) -> Result<Tensor, RelpropError> {
    let shape = input.shape();
    if shape.len() != 2 {
        return Err(RelpropError::UnsupportedOperation(format!(
            "batch_norm_op expects [batch, features] input, got {:?}",
            shape
        )));
    }
    let (b, f) = (shape[0], shape[1]);
    for stats in [running_mean, running_var] {
        if stats.len() != f {
            return Err(RelpropError::ShapeMismatch {
                expected: vec![f],
                actual: vec![stats.len()],
                operation: "batch_norm_op running stats".to_string(),
            });
        }
    }
    for param in weight.iter().chain(bias.iter()) {
        if param.shape() != [f] {
            return Err(RelpropError::ShapeMismatch {
                expected: vec![f],
                actual: param.shape(),
                operation: "batch_norm_op affine".to_string(),
            });
        }
    }

    let inv_std: Vec<f32> = running_var.iter().map(|v| 1.0 / (v + eps).sqrt()).collect();
    let gamma = weight.map(|t| t.buffer());
    let beta = bias.map(|t| t.buffer());
    let scale: Vec<f32> = (0..f)
        .map(|j| inv_std[j] * gamma.as_ref().map_or(1.0, |g| g[j]))
        .collect();

    let x = input.buffer();
    let mut normalized = Vec::with_capacity(b * f);
    let mut out = Vec::with_capacity(b * f);
    for (idx, xv) in x.iter().enumerate() {
        let j = idx % f;
        let n = (xv - running_mean[j]) * inv_std[j];
        normalized.push(n);
        out.push(n * gamma.as_ref().map_or(1.0, |g| g[j]) + beta.as_ref().map_or(0.0, |bt| bt[j]));
    }

    let result = Tensor::new_on(out, vec![b, f], input.device())?;
    let requires_grad = input.requires_grad()
        || weight.map_or(false, |t| t.requires_grad())
        || bias.map_or(false, |t| t.requires_grad());
    if requires_grad {
        result.set_grad_fn(Arc::new(BatchNormBackward {
            input: input.clone(),
            weight: weight.cloned(),
            bias: bias.cloned(),
            normalized,
            scale,
            batch: b,
            features: f,
        }));
    }
    Ok(result)
}
