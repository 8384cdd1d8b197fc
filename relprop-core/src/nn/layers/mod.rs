// src/nn/layers/mod.rs

pub mod add;
pub mod batchnorm;
pub mod linear;
pub mod relu;

// Re-export key layer structs
pub use add::Add;
pub use batchnorm::BatchNorm1d;
pub use linear::Linear;
pub use relu::ReLU;
