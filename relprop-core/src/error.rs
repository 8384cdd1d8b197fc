use crate::device::StorageDevice;
use thiserror::Error;

/// Custom error type for the relprop workspace.
#[derive(Error, Debug, PartialEq, Clone)] // PartialEq for easier testing
pub enum RelpropError {
    #[error("Shape mismatch: expected {expected:?}, got {actual:?} during operation {operation}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
        operation: String,
    },

    #[error("Incompatible shapes for operation: {shape1:?} and {shape2:?}")]
    IncompatibleShapes {
        shape1: Vec<usize>,
        shape2: Vec<usize>,
    },

    #[error("Tensor creation error: data length {data_len} does not match shape {shape:?}")]
    TensorCreationError { data_len: usize, shape: Vec<usize> },

    #[error("Index out of bounds: index {index:?} for shape {shape:?}")]
    IndexOutOfBounds {
        index: Vec<usize>,
        shape: Vec<usize>,
    },

    #[error("Operation requires tensor to require grad, but it doesn't.")]
    RequiresGradNotMet,

    #[error("Cannot set requires_grad on a non-leaf tensor.")]
    RequiresGradOnNonLeaf,

    #[error("Backward called on non-scalar tensor without explicit gradient.")]
    BackwardNonScalar,

    #[error("Shape mismatch during gradient accumulation: expected {expected:?}, got {actual:?}")]
    GradientAccumulationShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Backward op returned {actual} gradients for {expected} inputs")]
    GradientCountMismatch { expected: usize, actual: usize },

    #[error("Device mismatch for operation '{operation}': expected {expected:?}, got {actual:?}")]
    DeviceMismatch {
        expected: StorageDevice,
        actual: StorageDevice,
        operation: String,
    },

    #[error("Cycle detected in the computation graph during backward pass.")]
    CycleDetected,

    #[error("Expected {expected} input tensor(s) for layer '{layer}', got {actual}")]
    InputArity {
        layer: String,
        expected: usize,
        actual: usize,
    },

    #[error(
        "Layer '{layer}' is being used more than once in the network, which is not supported \
         by LRP. Please ensure that the layer is used only once in the network."
    )]
    LayerReused { layer: String },

    #[error("No cached activations for layer '{layer}' on device {device:?}; the weight pass did not run")]
    MissingActivations {
        layer: String,
        device: StorageDevice,
    },

    #[error("Relevance has not been computed for device {device:?}; run a backward pass first")]
    RelevanceNotComputed { device: StorageDevice },

    #[error(
        "Layer '{layer}' of kind {kind} has no rule defined and no default rule exists for this \
         kind. Please set a rule explicitly for this layer."
    )]
    NoRuleForLayer { layer: String, kind: String },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}
