use crate::device::StorageDevice;
use crate::error::RelpropError;
use crate::nn::init::{bias_uniform, kaiming_uniform};
use crate::nn::module::{expect_inputs, LayerKind, Module};
use crate::nn::parameter::Parameter;
use crate::ops::linear_op;
use crate::tensor::Tensor;
use rand::Rng;

/// Applies a linear transformation to the incoming data: y = xW^T + b
#[derive(Debug)]
pub struct Linear {
    pub(crate) weight: Parameter,
    pub(crate) bias: Option<Parameter>,
    in_features: usize,
    out_features: usize,
}

impl Linear {
    /// Creates a new Linear layer with Kaiming-uniform weights.
    ///
    /// # Arguments
    /// * `in_features` - Size of each input sample.
    /// * `out_features` - Size of each output sample.
    /// * `has_bias` - If `true`, the layer has an additive bias.
    pub fn new(in_features: usize, out_features: usize, has_bias: bool) -> Result<Self, RelpropError> {
        Self::with_rng(in_features, out_features, has_bias, &mut rand::thread_rng())
    }

    /// Same as [`Linear::new`] with an explicit random source.
    pub fn with_rng<R: Rng + ?Sized>(
        in_features: usize,
        out_features: usize,
        has_bias: bool,
        rng: &mut R,
    ) -> Result<Self, RelpropError> {
        let weight = kaiming_uniform(out_features, in_features, rng)?;
        let bias = if has_bias {
            Some(bias_uniform(out_features, in_features, rng)?)
        } else {
            None
        };
        Self::from_tensors(weight, bias)
    }

    /// Builds a layer from an explicit `[out, in]` weight and optional `[out]` bias.
    pub fn from_tensors(weight: Tensor, bias: Option<Tensor>) -> Result<Self, RelpropError> {
        let shape = weight.shape();
        if shape.len() != 2 {
            return Err(RelpropError::UnsupportedOperation(format!(
                "Linear weight must be 2-D, got {:?}",
                shape
            )));
        }
        let (out_features, in_features) = (shape[0], shape[1]);
        if let Some(bias) = &bias {
            if bias.shape() != [out_features] {
                return Err(RelpropError::ShapeMismatch {
                    expected: vec![out_features],
                    actual: bias.shape(),
                    operation: "Linear::from_tensors".to_string(),
                });
            }
        }
        Ok(Linear {
            weight: Parameter::new(weight, Some("weight".to_string())),
            bias: bias.map(|b| Parameter::new(b, Some("bias".to_string()))),
            in_features,
            out_features,
        })
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    pub fn out_features(&self) -> usize {
        self.out_features
    }
}

impl Module for Linear {
    fn forward(&self, inputs: &[Tensor]) -> Result<Tensor, RelpropError> {
        let inputs = expect_inputs(self, inputs, 1)?;
        linear_op(&inputs[0], &self.weight, self.bias.as_ref().map(Parameter::tensor))
    }

    fn kind(&self) -> LayerKind {
        LayerKind::Linear
    }

    fn type_name(&self) -> &'static str {
        "Linear"
    }

    fn weight(&self) -> Option<&Parameter> {
        Some(&self.weight)
    }

    fn bias(&self) -> Option<&Parameter> {
        self.bias.as_ref()
    }

    fn replicate(&self, device: StorageDevice) -> Result<Box<dyn Module>, RelpropError> {
        let weight = self.weight.to_device(device);
        let bias = self.bias.as_ref().map(|b| b.to_device(device));
        Ok(Box::new(Linear::from_tensors(weight, bias)?))
    }
}

#[cfg(test)]
#[path = "linear_test.rs"]
mod tests;
