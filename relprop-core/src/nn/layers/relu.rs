use crate::device::StorageDevice;
use crate::error::RelpropError;
use crate::nn::module::{expect_inputs, LayerKind, Module};
use crate::ops::relu_op;
use crate::tensor::Tensor;

/// Applies the rectified linear unit function element-wise: ReLU(x) = max(0, x)
#[derive(Debug, Default, Clone, Copy)]
pub struct ReLU;

impl ReLU {
    pub fn new() -> Self {
        ReLU
    }
}

impl Module for ReLU {
    fn forward(&self, inputs: &[Tensor]) -> Result<Tensor, RelpropError> {
        let inputs = expect_inputs(self, inputs, 1)?;
        relu_op(&inputs[0])
    }

    fn kind(&self) -> LayerKind {
        LayerKind::Activation
    }

    fn type_name(&self) -> &'static str {
        "ReLU"
    }

    fn replicate(&self, _device: StorageDevice) -> Result<Box<dyn Module>, RelpropError> {
        Ok(Box::new(ReLU))
    }
}
