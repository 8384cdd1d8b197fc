use num_traits::Float;
use relprop_core::ops::elementwise::{map, zip_with};
use relprop_core::{RelpropError, Tensor};

/// Default stability factor added to denominators.
pub const STABILITY_FACTOR: f32 = 1e-9;

/// `d + sign(d) * eps`, with `sign(0) = +1` so the result is never zero.
pub fn stabilize_scalar<T: Float>(d: T, eps: T) -> T {
    if d >= T::zero() {
        d + eps
    } else {
        d - eps
    }
}

/// Element-wise [`stabilize_scalar`].
pub fn stabilize(d: &Tensor, eps: f32) -> Result<Tensor, RelpropError> {
    map(d, |v| stabilize_scalar(v, eps))
}

/// `n / stabilize(d, eps)`, element-wise. Operands must share shape and device.
pub fn stabilized_div(n: &Tensor, d: &Tensor, eps: f32) -> Result<Tensor, RelpropError> {
    zip_with(n, d, |num, den| num / stabilize_scalar(den, eps))
}

#[cfg(test)]
#[path = "stabilize_test.rs"]
mod tests;
