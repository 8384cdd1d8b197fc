// src/nn/layer.rs

use crate::autograd::{BackwardOp, NodeId};
use crate::device::StorageDevice;
use crate::device_slots::DeviceSlots;
use crate::error::RelpropError;
use crate::hooks::{next_hook_id, HookHandle, HookId};
use crate::nn::module::{LayerKind, Module};
use crate::nn::parameter::Parameter;
use crate::tensor::Tensor;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// Called before the module's forward. May mutate the inputs in place
/// (see [`Tensor::set_data`]).
pub type ForwardPreHookFn =
    Arc<dyn Fn(&Layer, &[Tensor]) -> Result<(), RelpropError> + Send + Sync>;

/// Called after the module's forward with the inputs and the output.
/// Returning `Some(tensor)` replaces the output seen by the caller.
pub type ForwardHookFn =
    Arc<dyn Fn(&Layer, &[Tensor], &Tensor) -> Result<Option<Tensor>, RelpropError> + Send + Sync>;

/// What a layer backward hook sees when the layer's backward op runs.
#[derive(Debug)]
pub struct BackwardHookArgs<'a> {
    /// Graph node of the layer output this backward op belongs to.
    pub output: NodeId,
    /// Gradient arriving at the output, after the output's tensor hooks.
    pub grad_output: &'a Tensor,
    /// Gradients computed for the op inputs (input first, then parameters),
    /// possibly already replaced by an earlier hook.
    pub grad_inputs: &'a [Tensor],
}

/// Called when the layer's backward op has run. Returning `Some(grads)`
/// replaces the input gradients; the count must not change.
pub type BackwardHookFn =
    Arc<dyn Fn(&BackwardHookArgs<'_>) -> Result<Option<Vec<Tensor>>, RelpropError> + Send + Sync>;

#[derive(Default)]
struct LayerHooks {
    pre: Vec<(HookId, ForwardPreHookFn)>,
    post: Vec<(HookId, ForwardHookFn)>,
    backward: Vec<(HookId, BackwardHookFn)>,
}

impl LayerHooks {
    fn remove(&mut self, id: HookId) {
        self.pre.retain(|(hook_id, _)| *hook_id != id);
        self.post.retain(|(hook_id, _)| *hook_id != id);
        self.backward.retain(|(hook_id, _)| *hook_id != id);
    }

    fn len(&self) -> usize {
        self.pre.len() + self.post.len() + self.backward.len()
    }
}

/// Wraps a layer output's backward op so the layer's backward hooks see,
/// and may replace, the gradients it produces.
struct HookedBackward {
    inner: Arc<dyn BackwardOp + Send + Sync>,
    output: NodeId,
    hooks: Vec<BackwardHookFn>,
}

impl fmt::Debug for HookedBackward {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookedBackward")
            .field("inner", &self.inner)
            .field("output", &self.output)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl BackwardOp for HookedBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, RelpropError> {
        let mut grad_inputs = self.inner.backward(grad_output)?;
        for hook in &self.hooks {
            let args = BackwardHookArgs {
                output: self.output,
                grad_output,
                grad_inputs: &grad_inputs,
            };
            if let Some(replacement) = hook(&args)? {
                if replacement.len() != grad_inputs.len() {
                    return Err(RelpropError::GradientCountMismatch {
                        expected: grad_inputs.len(),
                        actual: replacement.len(),
                    });
                }
                grad_inputs = replacement;
            }
        }
        Ok(grad_inputs)
    }

    fn inputs(&self) -> Vec<Tensor> {
        self.inner.inputs()
    }
}

/// A named, hookable node of a model.
///
/// Wraps a [`Module`] and adds the three hook points relevance propagation
/// needs (pre-forward, post-forward, backward) plus a per-device cache of the
/// inputs the layer saw during the weight pass.
pub struct Layer {
    name: String,
    module: Box<dyn Module>,
    hooks: Arc<RwLock<LayerHooks>>,
    activations: DeviceSlots<Vec<Tensor>>,
}

impl Layer {
    pub fn new(name: impl Into<String>, module: impl Module + 'static) -> Self {
        Self::from_boxed(name, Box::new(module))
    }

    pub fn from_boxed(name: impl Into<String>, module: Box<dyn Module>) -> Self {
        Layer {
            name: name.into(),
            module,
            hooks: Arc::new(RwLock::new(LayerHooks::default())),
            activations: DeviceSlots::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> &dyn Module {
        self.module.as_ref()
    }

    pub fn kind(&self) -> LayerKind {
        self.module.kind()
    }

    pub fn weight(&self) -> Option<&Parameter> {
        self.module.weight()
    }

    pub fn bias(&self) -> Option<&Parameter> {
        self.module.bias()
    }

    pub fn parameters(&self) -> Vec<&Parameter> {
        self.module.parameters()
    }

    fn read_hooks(&self) -> RwLockReadGuard<'_, LayerHooks> {
        self.hooks.read().unwrap_or_else(|poisoned| {
            log::warn!("Hook list of layer '{}' was poisoned. Recovering.", self.name);
            poisoned.into_inner()
        })
    }

    fn write_hooks(&self) -> RwLockWriteGuard<'_, LayerHooks> {
        self.hooks.write().unwrap_or_else(|poisoned| {
            log::warn!("Hook list of layer '{}' was poisoned. Recovering.", self.name);
            poisoned.into_inner()
        })
    }

    fn handle(&self, id: HookId) -> HookHandle {
        let owner: Weak<RwLock<LayerHooks>> = Arc::downgrade(&self.hooks);
        HookHandle::new(id, move |id| {
            if let Some(hooks) = owner.upgrade() {
                hooks
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .remove(id);
            }
        })
    }

    pub fn register_forward_pre_hook(&self, hook: ForwardPreHookFn) -> HookHandle {
        let id = next_hook_id();
        self.write_hooks().pre.push((id, hook));
        self.handle(id)
    }

    pub fn register_forward_hook(&self, hook: ForwardHookFn) -> HookHandle {
        let id = next_hook_id();
        self.write_hooks().post.push((id, hook));
        self.handle(id)
    }

    /// Registers a hook around the backward op of every output produced
    /// while the hook is attached.
    pub fn register_backward_hook(&self, hook: BackwardHookFn) -> HookHandle {
        let id = next_hook_id();
        self.write_hooks().backward.push((id, hook));
        self.handle(id)
    }

    /// Number of layer hooks currently attached, all kinds together.
    pub fn hook_count(&self) -> usize {
        self.read_hooks().len()
    }

    /// Caches the inputs seen on `device`.
    ///
    /// A layer may only be cached once per device until
    /// [`Layer::clear_activations`]; a second visit means the layer is used
    /// more than once in the network and fails with `LayerReused`.
    pub fn cache_activations(
        &self,
        device: StorageDevice,
        inputs: Vec<Tensor>,
    ) -> Result<(), RelpropError> {
        self.activations
            .try_insert(device, inputs)
            .map_err(|_| RelpropError::LayerReused {
                layer: self.name.clone(),
            })
    }

    /// The inputs cached for `device`, if any.
    pub fn activations(&self, device: StorageDevice) -> Option<Vec<Tensor>> {
        self.activations.get(device)
    }

    pub fn clear_activations(&self, device: StorageDevice) {
        self.activations.take(device);
    }

    /// Runs the module with every attached hook.
    ///
    /// Order: pre-forward hooks, forward, backward-hook wrapping of the output
    /// node, post-forward hooks (each may replace the output).
    pub fn call(&self, inputs: &[Tensor]) -> Result<Tensor, RelpropError> {
        let (pre, post, backward) = {
            let hooks = self.read_hooks();
            (
                hooks.pre.iter().map(|(_, h)| Arc::clone(h)).collect::<Vec<_>>(),
                hooks.post.iter().map(|(_, h)| Arc::clone(h)).collect::<Vec<_>>(),
                hooks.backward.iter().map(|(_, h)| Arc::clone(h)).collect::<Vec<_>>(),
            )
        };

        for hook in &pre {
            hook(self, inputs)?;
        }

        let mut output = self.module.forward(inputs)?;

        if !backward.is_empty() {
            match output.grad_fn() {
                Some(inner) => {
                    let output_id = output.node_id();
                    output.set_grad_fn(Arc::new(HookedBackward {
                        inner,
                        output: output_id,
                        hooks: backward,
                    }));
                }
                None => log::warn!(
                    "Layer '{}' has backward hooks but its output is not part of a graph",
                    self.name
                ),
            }
        }

        for hook in &post {
            if let Some(replacement) = hook(self, inputs, &output)? {
                output = replacement;
            }
        }
        Ok(output)
    }

    /// A fresh layer with the same name, its module replicated onto `device`.
    /// Hooks and cached activations are not carried over.
    pub fn replicate(&self, device: StorageDevice) -> Result<Layer, RelpropError> {
        Ok(Layer::from_boxed(
            self.name.clone(),
            self.module.replicate(device)?,
        ))
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("name", &self.name)
            .field("module", &self.module)
            .field("hooks", &self.hook_count())
            .field("cached_devices", &self.activations.devices())
            .finish()
    }
}

#[cfg(test)]
#[path = "layer_test.rs"]
mod tests;
