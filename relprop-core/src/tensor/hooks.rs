// src/tensor/hooks.rs

use crate::error::RelpropError;
use crate::hooks::{next_hook_id, GradHookFn, HookHandle, TensorHook};
use crate::tensor::Tensor;
use std::sync::{Arc, Weak};

impl Tensor {
    /// Registers a gradient hook on this tensor.
    ///
    /// The hook fires once per backward pass, when the tensor's accumulated
    /// gradient is ready and before it is handed to `grad_fn` (or stored as
    /// `grad` on a leaf). Returning `Some(tensor)` replaces the gradient.
    pub fn register_hook<F>(&self, hook: F) -> HookHandle
    where
        F: Fn(&Tensor) -> Result<Option<Tensor>, RelpropError> + Send + Sync + 'static,
    {
        self.push_hook(None, Arc::new(hook))
    }

    /// Same as [`Tensor::register_hook`], tagging the hook with `label` so
    /// callers can later detect it with [`Tensor::has_hook`].
    pub fn register_labeled_hook<F>(&self, label: &str, hook: F) -> HookHandle
    where
        F: Fn(&Tensor) -> Result<Option<Tensor>, RelpropError> + Send + Sync + 'static,
    {
        self.push_hook(Some(label.to_string()), Arc::new(hook))
    }

    fn push_hook(&self, label: Option<String>, func: GradHookFn) -> HookHandle {
        let id = next_hook_id();
        self.write_data().hooks.push(TensorHook { id, label, func });
        let owner: Weak<_> = Arc::downgrade(&self.data);
        HookHandle::new(id, move |id| {
            if let Some(data) = owner.upgrade() {
                let mut guard = data.write().unwrap_or_else(|poisoned| poisoned.into_inner());
                guard.hooks.retain(|hook| hook.id != id);
            }
        })
    }

    /// Whether a hook registered under `label` is currently attached.
    pub fn has_hook(&self, label: &str) -> bool {
        self.read_data()
            .hooks
            .iter()
            .any(|hook| hook.label.as_deref() == Some(label))
    }

    /// Number of gradient hooks currently attached.
    pub fn hook_count(&self) -> usize {
        self.read_data().hooks.len()
    }

    /// Runs every hook in registration order, threading the gradient through.
    pub(crate) fn apply_grad_hooks(&self, grad: Tensor) -> Result<Tensor, RelpropError> {
        // Snapshot so hooks can touch this tensor without deadlocking.
        let hooks: Vec<TensorHook> = self.read_data().hooks.clone();
        let mut current = grad;
        for hook in hooks {
            if let Some(replacement) = (hook.func)(&current)? {
                log::trace!("Gradient hook {} replaced the gradient", hook.id);
                current = replacement;
            }
        }
        Ok(current)
    }
}
