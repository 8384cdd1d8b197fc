use crate::error::RelpropError;
use crate::ops::check_same_layout;
use crate::tensor::Tensor;

/// Combines two same-shaped tensors element by element, outside the graph.
///
/// The result is a fresh leaf on the operands' device. Used by gradient
/// hooks, which must not record new graph nodes while backward runs.
pub fn zip_with<F>(a: &Tensor, b: &Tensor, f: F) -> Result<Tensor, RelpropError>
where
    F: Fn(f32, f32) -> f32,
{
    check_same_layout(a, b, "zip_with")?;
    let a_data = a.buffer();
    let b_data = b.buffer();
    let data: Vec<f32> = a_data.iter().zip(b_data.iter()).map(|(&x, &y)| f(x, y)).collect();
    Tensor::new_on(data, a.shape(), a.device())
}

/// Applies `f` to every element, outside the graph.
pub fn map(a: &Tensor, f: impl Fn(f32) -> f32) -> Result<Tensor, RelpropError> {
    let data: Vec<f32> = a.buffer().iter().map(|&x| f(x)).collect();
    Tensor::new_on(data, a.shape(), a.device())
}
