use crate::error::RelpropError;
use crate::tensor::{uniform, Tensor};
use rand::Rng;

/// Kaiming-uniform initialization for a `[fan_out, fan_in]` weight matrix,
/// sampling from `U(-1/sqrt(fan_in), 1/sqrt(fan_in))`.
pub fn kaiming_uniform<R: Rng + ?Sized>(
    fan_out: usize,
    fan_in: usize,
    rng: &mut R,
) -> Result<Tensor, RelpropError> {
    let bound = fan_in_bound(fan_in);
    uniform(&[fan_out, fan_in], -bound, bound, rng)
}

/// Bias initialization matching [`kaiming_uniform`] for the same `fan_in`.
pub fn bias_uniform<R: Rng + ?Sized>(
    features: usize,
    fan_in: usize,
    rng: &mut R,
) -> Result<Tensor, RelpropError> {
    let bound = fan_in_bound(fan_in);
    uniform(&[features], -bound, bound, rng)
}

fn fan_in_bound(fan_in: usize) -> f32 {
    if fan_in == 0 {
        1.0
    } else {
        1.0 / (fan_in as f32).sqrt()
    }
}

#[cfg(test)]
#[path = "init_test.rs"]
mod tests;
