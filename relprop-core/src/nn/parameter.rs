use crate::error::RelpropError;
use crate::tensor::Tensor;
use std::fmt;
use std::ops::Deref;

/// A wrapper around a Tensor indicating it is a learnable parameter of a Module.
/// Parameters always have `requires_grad` set to `true`.
///
/// The data can be rewritten in place through `&Parameter`, which is how
/// relevance rules transform weights for the duration of an attribution.
#[derive(Clone)]
pub struct Parameter {
    tensor: Tensor,
    name: Option<String>,
}

impl Parameter {
    /// Creates a new Parameter from a leaf Tensor, enabling gradient tracking.
    pub fn new(tensor: Tensor, name: Option<String>) -> Self {
        tensor.write_data().requires_grad = true;
        Parameter { tensor, name }
    }

    pub fn new_unnamed(tensor: Tensor) -> Self {
        Self::new(tensor, None)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Copies the current values, for a later [`Parameter::restore`].
    pub fn snapshot(&self) -> Result<Vec<f32>, RelpropError> {
        self.tensor.get_f32_data()
    }

    /// Puts back values taken with [`Parameter::snapshot`].
    pub fn restore(&self, values: Vec<f32>) -> Result<(), RelpropError> {
        self.tensor.set_data(values)
    }

    pub fn tensor(&self) -> &Tensor {
        &self.tensor
    }

    /// Consumes the Parameter and returns the underlying Tensor.
    pub fn into_inner(self) -> Tensor {
        self.tensor
    }
}

// Allow accessing the underlying Tensor immutably via Deref.
impl Deref for Parameter {
    type Target = Tensor;

    fn deref(&self) -> &Self::Target {
        &self.tensor
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parameter({:?}, {:?})", self.name, self.tensor)
    }
}
