// src/rules/mod.rs
// Relevance propagation rules: hook registration and relevance bookkeeping
// for one layer, with the weight transform delegated to `RuleKind`.

mod kind;

pub use kind::RuleKind;

use crate::stabilize::stabilized_div;
use crate::store::{Relevance, RelevanceStore};
use crate::substitute::SubstituteSlots;
use relprop_core::nn::{BackwardHookArgs, BackwardHookFn, Layer, LayerKind};
use relprop_core::ops::elementwise::zip_with;
use relprop_core::{DeviceSlots, HookHandle, RelpropError, StorageDevice, Tensor};
use std::fmt;
use std::sync::Arc;

/// Label of the relevance-input gradient hook. A tensor carrying it is not
/// hooked a second time.
pub const RELEVANCE_INPUT_HOOK: &str = "relprop.relevance_input";
/// Label of the relevance-output gradient hook.
pub const RELEVANCE_OUTPUT_HOOK: &str = "relprop.relevance_output";

/// A relevance propagation rule bound to one layer.
///
/// During the weight pass the rule caches the layer inputs and transforms
/// the weights. During the relevance pass it restores the cached inputs and
/// hooks the input and output tensors, so that backward turns gradients into
/// relevance:
///
/// * output hook: stores the incoming gradient as output relevance and
///   forwards `g / stabilize(z)`;
/// * input hook: turns the gradient into `g * x` (or, for `Identity`, the
///   stored output relevance) and stores it as input relevance.
///
/// All state is per device, so one rule can serve several devices at once.
#[derive(Debug)]
pub struct PropagationRule {
    kind: RuleKind,
    stability_factor: f32,
    store: RelevanceStore,
    handles: DeviceSlots<Vec<HookHandle>>,
}

impl PropagationRule {
    pub fn new(kind: RuleKind) -> Self {
        PropagationRule {
            kind,
            stability_factor: kind.stability_factor(),
            store: RelevanceStore::new(),
            handles: DeviceSlots::new(),
        }
    }

    pub fn epsilon(epsilon: f32) -> Self {
        Self::new(RuleKind::Epsilon { epsilon })
    }

    pub fn gamma(gamma: f32, set_bias_to_zero: bool) -> Self {
        Self::new(RuleKind::Gamma {
            gamma,
            set_bias_to_zero,
        })
    }

    pub fn gamma_default() -> Self {
        Self::new(RuleKind::gamma_default())
    }

    pub fn alpha1_beta0(set_bias_to_zero: bool) -> Self {
        Self::new(RuleKind::Alpha1Beta0 { set_bias_to_zero })
    }

    pub fn identity() -> Self {
        Self::new(RuleKind::Identity)
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn stability_factor(&self) -> f32 {
        self.stability_factor
    }

    pub fn store(&self) -> &RelevanceStore {
        &self.store
    }

    pub fn relevance_input(&self, device: StorageDevice) -> Result<Relevance, RelpropError> {
        self.store.relevance_input(device)
    }

    pub fn relevance_output(&self, device: StorageDevice) -> Result<Tensor, RelpropError> {
        self.store.relevance_output(device)
    }

    /// Post-forward hook of the relevance pass.
    ///
    /// Registers one relevance-input hook per distinct input not hooked yet
    /// and one relevance-output hook on `output`, then returns a tracked copy
    /// of `output` for the next layer to consume.
    pub fn on_forward(
        self: &Arc<Self>,
        layer: &Layer,
        inputs: &[Tensor],
        output: &Tensor,
        substitutes: &Arc<SubstituteSlots>,
    ) -> Result<Tensor, RelpropError> {
        let device = output.device();
        let single_input = inputs.len() == 1;

        let mut to_hook: Vec<&Tensor> = Vec::with_capacity(inputs.len());
        for input in inputs {
            let seen = to_hook.iter().any(|hooked| hooked.node_id() == input.node_id());
            if seen || input.has_hook(RELEVANCE_INPUT_HOOK) {
                log::trace!("Input of layer '{}' already carries a relevance hook", layer.name());
                continue;
            }
            to_hook.push(input);
        }
        self.store.begin_pass(device, single_input, to_hook.len());

        let mut handles = Vec::with_capacity(to_hook.len() + 1);
        for (index, input) in to_hook.into_iter().enumerate() {
            let position = (!single_input).then_some(index);
            handles.push(self.register_input_hook(input, position, substitutes));
        }
        handles.push(self.register_output_hook(output));

        log::debug!(
            "{} registered {} relevance hooks on layer '{}' ({:?})",
            self.kind,
            handles.len(),
            layer.name(),
            device
        );
        self.handles
            .with_mut(device, |slot| slot.get_or_insert_with(Vec::new).extend(handles));
        output.duplicate()
    }

    fn register_input_hook(
        self: &Arc<Self>,
        input: &Tensor,
        position: Option<usize>,
        substitutes: &Arc<SubstituteSlots>,
    ) -> HookHandle {
        let rule = Arc::clone(self);
        let substitutes = Arc::clone(substitutes);
        // Value seen by the layer, captured before backward runs.
        let activation = input.detach();
        let node = input.node_id();
        input.register_labeled_hook(RELEVANCE_INPUT_HOOK, move |grad| {
            let relevance = rule.input_relevance(grad, &activation)?;
            rule.store
                .record_input_relevance(grad.device(), relevance.clone(), position);
            substitutes.insert(node, relevance.clone());
            Ok(Some(relevance))
        })
    }

    fn input_relevance(&self, grad: &Tensor, activation: &Tensor) -> Result<Tensor, RelpropError> {
        match self.kind {
            RuleKind::Identity => {
                let relevance = self.store.relevance_output(grad.device())?;
                if relevance.shape() != grad.shape() {
                    return Err(RelpropError::ShapeMismatch {
                        expected: grad.shape(),
                        actual: relevance.shape(),
                        operation: "IdentityRule input relevance".to_string(),
                    });
                }
                Ok(relevance)
            }
            _ => zip_with(grad, activation, |g, x| g * x),
        }
    }

    fn register_output_hook(self: &Arc<Self>, output: &Tensor) -> HookHandle {
        let rule = Arc::clone(self);
        let activation = output.detach();
        output.register_labeled_hook(RELEVANCE_OUTPUT_HOOK, move |grad| {
            rule.store.record_output_relevance(grad.device(), grad.detach());
            Ok(Some(stabilized_div(grad, &activation, rule.stability_factor)?))
        })
    }

    /// Post-forward hook of the weight pass: caches the layer inputs for the
    /// device, then transforms the weights.
    ///
    /// Fails with `LayerReused` when the layer already ran on this device.
    pub fn on_forward_weights(&self, layer: &Layer, inputs: &[Tensor]) -> Result<(), RelpropError> {
        let device = inputs.first().map(Tensor::device).unwrap_or_default();
        layer.cache_activations(device, inputs.iter().map(Tensor::detach).collect())?;
        self.manipulate_weights(layer)
    }

    /// Pre-forward hook of the relevance pass: puts the cached weight-pass
    /// values back into the inputs.
    pub fn on_forward_pre_activations(&self, layer: &Layer, inputs: &[Tensor]) -> Result<(), RelpropError> {
        let device = inputs.first().map(Tensor::device).unwrap_or_default();
        let cached = layer
            .activations(device)
            .ok_or_else(|| RelpropError::MissingActivations {
                layer: layer.name().to_string(),
                device,
            })?;
        if cached.len() != inputs.len() {
            return Err(RelpropError::InputArity {
                layer: layer.name().to_string(),
                expected: cached.len(),
                actual: inputs.len(),
            });
        }
        for (input, activation) in inputs.iter().zip(cached.iter()) {
            input.set_data_from(activation)?;
        }
        Ok(())
    }

    /// Applies the variant's weight transform and bias zeroing in place.
    pub fn manipulate_weights(&self, layer: &Layer) -> Result<(), RelpropError> {
        if !self.kind.keeps_weights() {
            if matches!(self.kind, RuleKind::Alpha1Beta0 { .. }) && layer.kind() == LayerKind::Normalization {
                log::warn!(
                    "{} applied to normalization layer '{}'; its weights are not a linear map",
                    self.kind,
                    layer.name()
                );
            }
            if let Some(weight) = layer.weight() {
                let transformed: Vec<f32> = weight
                    .get_f32_data()?
                    .into_iter()
                    .map(|w| self.kind.transform_weight(w))
                    .collect();
                weight.set_data(transformed)?;
            }
        }
        if self.kind.zeroes_bias() {
            if let Some(bias) = layer.bias() {
                bias.set_data(vec![0.0; bias.numel()])?;
            }
        }
        Ok(())
    }

    /// Removes every tensor hook this rule registered on `device`.
    pub fn release_hooks(&self, device: StorageDevice) -> usize {
        let handles = self.handles.take(device).unwrap_or_default();
        let released = handles.len();
        for handle in handles {
            handle.remove();
        }
        released
    }

    /// Number of tensor hooks currently held for `device`.
    pub fn hook_count(&self, device: StorageDevice) -> usize {
        self.handles
            .with_mut(device, |slot| slot.as_ref().map_or(0, Vec::len))
    }

    /// Backward hook for parameter-free activation layers.
    ///
    /// Relays the relevance left in `substitutes` for the layer output when
    /// there is one, the incoming gradient otherwise. The activation's own
    /// derivative is ignored either way.
    pub fn activation_passthrough(substitutes: Arc<SubstituteSlots>) -> BackwardHookFn {
        Arc::new(move |args: &BackwardHookArgs<'_>| {
            let relevance = match substitutes.take(args.output) {
                Some(substitute) => substitute,
                None => args.grad_output.clone(),
            };
            Ok(Some(vec![relevance; args.grad_inputs.len()]))
        })
    }
}

impl fmt::Display for PropagationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind, f)
    }
}

#[cfg(test)]
#[path = "rules_test.rs"]
mod tests;
