// src/tensor/create.rs

use crate::error::RelpropError;
use crate::tensor::Tensor;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal, Uniform};

/// Creates a new CPU tensor filled with zeros with the specified shape.
pub fn zeros(shape: &[usize]) -> Result<Tensor, RelpropError> {
    full(shape, 0.0)
}

/// Creates a new CPU tensor filled with ones with the specified shape.
pub fn ones(shape: &[usize]) -> Result<Tensor, RelpropError> {
    full(shape, 1.0)
}

/// Creates a new CPU tensor filled with `value`.
pub fn full(shape: &[usize], value: f32) -> Result<Tensor, RelpropError> {
    let numel = shape.iter().product();
    Tensor::new(vec![value; numel], shape.to_vec())
}

/// Creates a tensor of zeros with the same shape and device as `tensor`.
pub fn zeros_like(tensor: &Tensor) -> Result<Tensor, RelpropError> {
    let shape = tensor.shape();
    let numel = shape.iter().product();
    Tensor::new_on(vec![0.0; numel], shape, tensor.device())
}

/// Creates a tensor of ones with the same shape and device as `tensor`.
pub fn ones_like(tensor: &Tensor) -> Result<Tensor, RelpropError> {
    let shape = tensor.shape();
    let numel = shape.iter().product();
    Tensor::new_on(vec![1.0; numel], shape, tensor.device())
}

/// Samples a CPU tensor from the standard normal distribution.
pub fn randn<R: Rng + ?Sized>(shape: &[usize], rng: &mut R) -> Result<Tensor, RelpropError> {
    let numel: usize = shape.iter().product();
    let data: Vec<f32> = (0..numel).map(|_| StandardNormal.sample(rng)).collect();
    Tensor::new(data, shape.to_vec())
}

/// Samples a CPU tensor uniformly from `[low, high)`.
pub fn uniform<R: Rng + ?Sized>(
    shape: &[usize],
    low: f32,
    high: f32,
    rng: &mut R,
) -> Result<Tensor, RelpropError> {
    if !(low < high) {
        return Err(RelpropError::UnsupportedOperation(format!(
            "uniform requires low < high, got [{}, {})",
            low, high
        )));
    }
    let numel: usize = shape.iter().product();
    let dist = Uniform::new(low, high);
    let data: Vec<f32> = (0..numel).map(|_| dist.sample(rng)).collect();
    Tensor::new(data, shape.to_vec())
}

#[cfg(test)]
#[path = "create_test.rs"]
mod tests;
