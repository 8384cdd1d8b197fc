use crate::device::StorageDevice;
use crate::error::RelpropError;
use crate::nn::Parameter;
use crate::tensor::Tensor;
use std::fmt;

/// Coarse classification of a module, used to pick default relevance rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Affine maps with a `weight` (and optional `bias`): Linear.
    Linear,
    /// Parameter-free non-linearities that relevance passes through unchanged.
    Activation,
    /// Shape-preserving normalization: BatchNorm.
    Normalization,
    /// Layers combining several inputs into one output: Add.
    Merge,
    Other,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayerKind::Linear => "Linear",
            LayerKind::Activation => "Activation",
            LayerKind::Normalization => "Normalization",
            LayerKind::Merge => "Merge",
            LayerKind::Other => "Other",
        };
        f.write_str(name)
    }
}

/// The base trait for all neural network modules.
pub trait Module: fmt::Debug + Send + Sync {
    /// Performs a forward pass of the module.
    ///
    /// # Arguments
    /// * `inputs`: the input tensors, in argument order. Most modules take one.
    fn forward(&self, inputs: &[Tensor]) -> Result<Tensor, RelpropError>;

    /// What kind of layer this is.
    fn kind(&self) -> LayerKind;

    /// Short type name used in logs and error messages.
    fn type_name(&self) -> &'static str;

    /// The `weight` parameter, if the module has one.
    fn weight(&self) -> Option<&Parameter> {
        None
    }

    /// The `bias` parameter, if the module has one.
    fn bias(&self) -> Option<&Parameter> {
        None
    }

    /// Returns all learnable parameters of the module.
    fn parameters(&self) -> Vec<&Parameter> {
        self.weight().into_iter().chain(self.bias()).collect()
    }

    /// Returns all learnable parameters with their names.
    fn named_parameters(&self) -> Vec<(String, &Parameter)> {
        let mut params = Vec::new();
        if let Some(weight) = self.weight() {
            params.push(("weight".to_string(), weight));
        }
        if let Some(bias) = self.bias() {
            params.push(("bias".to_string(), bias));
        }
        params
    }

    /// Deep copy with every parameter attributed to `device`.
    fn replicate(&self, device: StorageDevice) -> Result<Box<dyn Module>, RelpropError>;
}

/// Checks the number of inputs a module received.
pub(crate) fn expect_inputs<'a>(
    module: &dyn Module,
    inputs: &'a [Tensor],
    expected: usize,
) -> Result<&'a [Tensor], RelpropError> {
    if inputs.len() != expected {
        return Err(RelpropError::InputArity {
            layer: module.type_name().to_string(),
            expected,
            actual: inputs.len(),
        });
    }
    Ok(inputs)
}
