// src/nn/mod.rs
// Layers, the Module trait and the hookable Layer wrapper.

pub mod init;
pub mod layer;
pub mod layers;
pub mod module; // Trait Module
pub mod parameter; // struct Parameter

// Re-export common items
pub use layer::{BackwardHookArgs, BackwardHookFn, ForwardHookFn, ForwardPreHookFn, Layer};
pub use layers::{Add, BatchNorm1d, Linear, ReLU};
pub use module::{LayerKind, Module};
pub use parameter::Parameter;
