//! Registration tokens and callback types shared by tensor and layer hooks.

use crate::error::RelpropError;
use crate::tensor::Tensor;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier of a registered hook, across tensors and layers.
pub type HookId = u64;

static NEXT_HOOK_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_hook_id() -> HookId {
    NEXT_HOOK_ID.fetch_add(1, Ordering::Relaxed)
}

/// Callback fired when a tensor's gradient becomes available during backward.
///
/// Receives the accumulated gradient. Returning `Some(tensor)` replaces the
/// gradient seen by every later hook and by the tensor's `grad_fn`.
pub type GradHookFn = Arc<dyn Fn(&Tensor) -> Result<Option<Tensor>, RelpropError> + Send + Sync>;

/// A gradient hook attached to a tensor.
#[derive(Clone)]
pub(crate) struct TensorHook {
    pub(crate) id: HookId,
    pub(crate) label: Option<String>,
    pub(crate) func: GradHookFn,
}

impl fmt::Debug for TensorHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TensorHook")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish()
    }
}

/// Removable handle returned by every `register_*hook` call.
///
/// Dropping the handle leaves the hook in place; call [`HookHandle::remove`]
/// to detach it. Removing a hook whose owner is already gone is a no-op.
pub struct HookHandle {
    id: HookId,
    remover: Option<Box<dyn FnOnce(HookId) + Send + Sync>>,
}

impl HookHandle {
    pub(crate) fn new(id: HookId, remover: impl FnOnce(HookId) + Send + Sync + 'static) -> Self {
        HookHandle {
            id,
            remover: Some(Box::new(remover)),
        }
    }

    pub fn id(&self) -> HookId {
        self.id
    }

    /// Detaches the hook from its tensor or layer.
    pub fn remove(mut self) {
        if let Some(remover) = self.remover.take() {
            remover(self.id);
        }
    }
}

impl fmt::Debug for HookHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HookHandle({})", self.id)
    }
}
