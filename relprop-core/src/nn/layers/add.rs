use crate::device::StorageDevice;
use crate::error::RelpropError;
use crate::nn::module::{expect_inputs, LayerKind, Module};
use crate::ops::add_op;
use crate::tensor::Tensor;

/// Element-wise sum of two same-shaped inputs, used for skip connections.
#[derive(Debug, Default, Clone, Copy)]
pub struct Add;

impl Add {
    pub fn new() -> Self {
        Add
    }
}

impl Module for Add {
    fn forward(&self, inputs: &[Tensor]) -> Result<Tensor, RelpropError> {
        let inputs = expect_inputs(self, inputs, 2)?;
        add_op(&inputs[0], &inputs[1])
    }

    fn kind(&self) -> LayerKind {
        LayerKind::Merge
    }

    fn type_name(&self) -> &'static str {
        "Add"
    }

    fn replicate(&self, _device: StorageDevice) -> Result<Box<dyn Module>, RelpropError> {
        Ok(Box::new(Add))
    }
}
