use crate::device::StorageDevice;
use crate::error::RelpropError;
use crate::nn::module::{expect_inputs, LayerKind, Module};
use crate::nn::parameter::Parameter;
use crate::ops::batch_norm_op;
use crate::tensor::{ones, zeros, Tensor};

/// Batch normalization over `[batch, features]` input, inference mode.
///
/// Normalizes with the stored running statistics; the affine `weight` and
/// `bias` are learnable parameters.
#[derive(Debug)]
pub struct BatchNorm1d {
    weight: Parameter,
    bias: Parameter,
    running_mean: Vec<f32>,
    running_var: Vec<f32>,
    eps: f32,
}

impl BatchNorm1d {
    pub const DEFAULT_EPS: f32 = 1e-5;

    /// Identity statistics (mean 0, var 1), weight 1 and bias 0.
    pub fn new(num_features: usize) -> Result<Self, RelpropError> {
        Self::with_running_stats(
            ones(&[num_features])?,
            zeros(&[num_features])?,
            vec![0.0; num_features],
            vec![1.0; num_features],
            Self::DEFAULT_EPS,
        )
    }

    /// Builds a layer from explicit affine parameters and running statistics.
    pub fn with_running_stats(
        weight: Tensor,
        bias: Tensor,
        running_mean: Vec<f32>,
        running_var: Vec<f32>,
        eps: f32,
    ) -> Result<Self, RelpropError> {
        let features = weight.numel();
        for (len, what) in [
            (bias.numel(), "bias"),
            (running_mean.len(), "running_mean"),
            (running_var.len(), "running_var"),
        ] {
            if len != features {
                return Err(RelpropError::ShapeMismatch {
                    expected: vec![features],
                    actual: vec![len],
                    operation: format!("BatchNorm1d {}", what),
                });
            }
        }
        Ok(BatchNorm1d {
            weight: Parameter::new(weight, Some("weight".to_string())),
            bias: Parameter::new(bias, Some("bias".to_string())),
            running_mean,
            running_var,
            eps,
        })
    }

    pub fn num_features(&self) -> usize {
        self.running_mean.len()
    }
}

impl Module for BatchNorm1d {
    fn forward(&self, inputs: &[Tensor]) -> Result<Tensor, RelpropError> {
        let inputs = expect_inputs(self, inputs, 1)?;
        batch_norm_op(
            &inputs[0],
            Some(self.weight.tensor()),
            Some(self.bias.tensor()),
            &self.running_mean,
            &self.running_var,
            self.eps,
        )
    }

    fn kind(&self) -> LayerKind {
        LayerKind::Normalization
    }

    fn type_name(&self) -> &'static str {
        "BatchNorm1d"
    }

    fn weight(&self) -> Option<&Parameter> {
        Some(&self.weight)
    }

    fn bias(&self) -> Option<&Parameter> {
        Some(&self.bias)
    }

    fn replicate(&self, device: StorageDevice) -> Result<Box<dyn Module>, RelpropError> {
        Ok(Box::new(BatchNorm1d::with_running_stats(
            self.weight.to_device(device),
            self.bias.to_device(device),
            self.running_mean.clone(),
            self.running_var.clone(),
            self.eps,
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::check_tensor_near;

    #[test]
    fn test_batchnorm_uses_running_stats() -> Result<(), RelpropError> {
        let bn = BatchNorm1d::with_running_stats(
            Tensor::new(vec![2.0, 1.0], vec![2])?,
            Tensor::new(vec![0.0, 1.0], vec![2])?,
            vec![1.0, 0.0],
            vec![4.0, 1.0],
            0.0,
        )?;
        let input = Tensor::new(vec![3.0, 2.0, -1.0, 0.0], vec![2, 2])?;
        let output = bn.forward(&[input])?;
        check_tensor_near(&output, &[2, 2], &[2.0, 3.0, -2.0, 1.0], 1e-6);
        assert_eq!(bn.kind(), LayerKind::Normalization);
        Ok(())
    }

    #[test]
    fn test_batchnorm_rejects_mismatched_stats() -> Result<(), RelpropError> {
        let result = BatchNorm1d::with_running_stats(
            ones(&[3])?,
            zeros(&[3])?,
            vec![0.0; 2],
            vec![1.0; 3],
            1e-5,
        );
        assert!(matches!(result, Err(RelpropError::ShapeMismatch { .. })));
        Ok(())
    }
}
