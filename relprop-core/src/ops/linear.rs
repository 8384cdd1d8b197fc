use crate::autograd::BackwardOp;
use crate::error::RelpropError;
use crate::tensor::Tensor;
use std::sync::Arc;

/// Backward of `y = x W^T + b` for `x: [B, in]`, `W: [out, in]`, `b: [out]`.
#[derive(Debug)]
struct LinearBackward {
    input: Tensor,
    weight: Tensor,
    bias: Option<Tensor>,
    input_saved: Tensor,
    weight_saved: Tensor,
    batch: usize,
    in_features: usize,
    out_features: usize,
}

impl BackwardOp for LinearBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, RelpropError> {
        let (b, n_in, n_out) = (self.batch, self.in_features, self.out_features);
        let device = grad_output.device();
        let g = grad_output.buffer();
        let x = self.input_saved.buffer();
        let w = self.weight_saved.buffer();

        // grad_input = g @ W : [B, out] x [out, in]
        let mut grad_input = vec![0.0f32; b * n_in];
        for i in 0..b {
            for k in 0..n_out {
                let gk = g[i * n_out + k];
                if gk == 0.0 {
                    continue;
                }
                for j in 0..n_in {
                    grad_input[i * n_in + j] += gk * w[k * n_in + j];
                }
            }
        }

        // grad_weight = g^T @ x : [out, B] x [B, in]
        let mut grad_weight = vec![0.0f32; n_out * n_in];
        for i in 0..b {
            for k in 0..n_out {
                let gk = g[i * n_out + k];
                for j in 0..n_in {
                    grad_weight[k * n_in + j] += gk * x[i * n_in + j];
                }
            }
        }

        let mut grads = vec![
            Tensor::new_on(grad_input, vec![b, n_in], device)?,
            Tensor::new_on(grad_weight, vec![n_out, n_in], device)?,
        ];
        if self.bias.is_some() {
            let mut grad_bias = vec![0.0f32; n_out];
            for i in 0..b {
                for k in 0..n_out {
                    grad_bias[k] += g[i * n_out + k];
                }
            }
            grads.push(Tensor::new_on(grad_bias, vec![n_out], device)?);
        }
        Ok(grads)
    }

    fn inputs(&self) -> Vec<Tensor> {
        let mut inputs = vec![self.input.clone(), self.weight.clone()];
        if let Some(bias) = &self.bias {
            inputs.push(bias.clone());
        }
        inputs
    }
}

/// Applies `y = x W^T + b`.
///
/// # Arguments
/// * `input`: `[batch, in_features]`
/// * `weight`: `[out_features, in_features]`
/// * `bias`: optional `[out_features]`
pub fn linear_op(input: &Tensor, weight: &Tensor, bias: Option<&Tensor>) -> Result<Tensor, RelpropError> {
    let input_shape = input.shape();
    let weight_shape = weight.shape();
    if input_shape.len() != 2 || weight_shape.len() != 2 || input_shape[1] != weight_shape[1] {
        return Err(RelpropError::IncompatibleShapes {
            shape1: input_shape,
            shape2: weight_shape,
        });
    }
    let device = input.device();
    for param in std::iter::once(weight).chain(bias) {
        if param.device() != device {
            return Err(RelpropError::DeviceMismatch {
                expected: device,
                actual: param.device(),
                operation: "linear_op".to_string(),
            });
        }
    }
    let (b, n_in, n_out) = (input_shape[0], input_shape[1], weight_shape[0]);
    if let Some(bias) = bias {
        if bias.shape() != [n_out] {
            return Err(RelpropError::ShapeMismatch {
                expected: vec![n_out],
                actual: bias.shape(),
                operation: "linear_op bias".to_string(),
            });
        }
    }

    let x = input.buffer();
    let w = weight.buffer();
    let bias_data = bias.map(|t| t.buffer());
    let mut out = vec![0.0f32; b * n_out];
    for i in 0..b {
        for k in 0..n_out {
            let mut acc = bias_data.as_ref().map_or(0.0, |bd| bd[k]);
            for j in 0..n_in {
                acc += x[i * n_in + j] * w[k * n_in + j];
            }
            out[i * n_out + k] = acc;
        }
    }

    let result = Tensor::new_on(out, vec![b, n_out], device)?;
    let requires_grad =
        input.requires_grad() || weight.requires_grad() || bias.map_or(false, |t| t.requires_grad());
    if requires_grad {
        result.set_grad_fn(Arc::new(LinearBackward {
            input: input.clone(),
            weight: weight.clone(),
            bias: bias.cloned(),
            input_saved: input.detach(),
            weight_saved: weight.detach(),
            batch: b,
            in_features: n_in,
            out_features: n_out,
        }));
    }
    Ok(result)
}

#[cfg(test)]
#[path = "linear_test.rs"]
mod tests;
