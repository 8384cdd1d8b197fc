//! Tensor and autograd engine with the hook points relevance propagation
//! needs: gradient hooks on tensors, forward/backward hooks on layers and
//! per-device state slots.

pub mod autograd;
pub mod device;
pub mod device_slots;
pub mod error;
pub mod hooks;
pub mod model;
pub mod nn;
pub mod ops;
pub mod tensor;
pub mod tensor_data;
pub mod utils;

pub use autograd::NodeId;
pub use device::StorageDevice;
pub use device_slots::DeviceSlots;
pub use error::RelpropError;
pub use hooks::HookHandle;
pub use tensor::Tensor;
// Re-export traits required by public functions/structs
pub use num_traits;
