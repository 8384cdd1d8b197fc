// src/lrp.rs
// Attribution orchestrator: attaches rules to the layers of a model and runs
// the weight pass, the relevance pass and the backward pass.

use crate::rules::{PropagationRule, RuleKind};
use crate::store::Relevance;
use crate::substitute::SubstituteSlots;
use relprop_core::hooks::HookHandle;
use relprop_core::model::Sequential;
use relprop_core::nn::{Layer, LayerKind, Parameter};
use relprop_core::ops::copy_op;
use relprop_core::ops::reduction::sum_rows;
use relprop_core::{RelpropError, StorageDevice, Tensor};
use std::collections::HashMap;
use std::sync::Arc;

/// Which side of each ruled layer [`LrpAttribution::layer_relevances`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerRelevanceMode {
    /// Relevance arriving at the layer output.
    #[default]
    Output,
    /// Relevance handed to the layer inputs.
    Input,
}

#[derive(Debug, Clone, Default)]
pub struct AttributeOptions {
    /// Log the rule applied to every layer at `info` level.
    pub verbose: bool,
    /// Also report per-layer relevance.
    pub layer_relevance: Option<LayerRelevanceMode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerRelevance {
    pub layer: String,
    pub relevance: Relevance,
}

/// Result of [`Lrp::attribute`].
#[derive(Debug, Clone)]
pub struct LrpAttribution {
    /// Relevance of every input element, shaped like the input.
    pub relevance: Tensor,
    /// Model output with the original weights.
    pub output: Tensor,
    /// Per sample: total input relevance minus the target output score.
    pub convergence_delta: Vec<f32>,
    /// In model order, ruled layers only.
    pub layer_relevances: Option<Vec<LayerRelevance>>,
}

#[derive(Clone)]
enum LayerPlan {
    Rule(Arc<PropagationRule>),
    Passthrough,
}

/// Layer-wise relevance propagation over a [`Sequential`] model.
///
/// Layers without an explicit rule get a default one by kind: Epsilon for
/// linear and normalization layers, relevance passthrough for activations.
/// Any other layer needs an explicit rule.
pub struct Lrp {
    model: Sequential,
    rules: HashMap<String, Arc<PropagationRule>>,
    substitutes: Arc<SubstituteSlots>,
}

impl Lrp {
    pub fn new(model: &Sequential) -> Self {
        Lrp {
            model: model.clone(),
            rules: HashMap::new(),
            substitutes: Arc::new(SubstituteSlots::new()),
        }
    }

    pub fn model(&self) -> &Sequential {
        &self.model
    }

    /// Assigns `rule` to the layer called `layer`.
    pub fn set_rule(&mut self, layer: &str, rule: Arc<PropagationRule>) -> Result<(), RelpropError> {
        if self.model.layer(layer).is_none() {
            return Err(RelpropError::UnsupportedOperation(format!(
                "the model has no layer named '{}'",
                layer
            )));
        }
        self.rules.insert(layer.to_string(), rule);
        Ok(())
    }

    /// The rule of `layer`: explicit, or the default picked by a previous
    /// attribution.
    pub fn rule(&self, layer: &str) -> Option<Arc<PropagationRule>> {
        self.rules.get(layer).cloned()
    }

    pub fn has_convergence_delta(&self) -> bool {
        true
    }

    fn plan(&mut self) -> Result<Vec<(Arc<Layer>, LayerPlan)>, RelpropError> {
        let mut plan = Vec::new();
        for layer in self.model.unique_layers() {
            let step = match self.rules.get(layer.name()) {
                Some(rule) => LayerPlan::Rule(Arc::clone(rule)),
                None => match layer.kind() {
                    LayerKind::Linear | LayerKind::Normalization => {
                        let rule = Arc::new(PropagationRule::new(RuleKind::epsilon_default()));
                        self.rules.insert(layer.name().to_string(), Arc::clone(&rule));
                        LayerPlan::Rule(rule)
                    }
                    LayerKind::Activation => LayerPlan::Passthrough,
                    kind => {
                        return Err(RelpropError::NoRuleForLayer {
                            layer: layer.name().to_string(),
                            kind: kind.to_string(),
                        })
                    }
                },
            };
            plan.push((layer, step));
        }
        Ok(plan)
    }

    /// Attributes the `target` output of every sample in `input` to the
    /// input elements.
    ///
    /// The model is left as it was found: weights and gradients are
    /// restored and every hook is removed, also when the call fails.
    pub fn attribute(
        &mut self,
        input: &Tensor,
        target: usize,
        options: &AttributeOptions,
    ) -> Result<LrpAttribution, RelpropError> {
        let device = input.device();
        let plan = self.plan()?;
        if options.verbose {
            for (layer, step) in &plan {
                match step {
                    LayerPlan::Rule(rule) => log::info!("Applied {} on layer '{}'", rule, layer.name()),
                    LayerPlan::Passthrough => log::info!("Relevance passes through layer '{}'", layer.name()),
                }
            }
        }
        let mut session = LrpSession::begin(device, &plan, Arc::clone(&self.substitutes))?;

        // Weight pass: original output, cached inputs, transformed weights.
        for (layer, step) in &plan {
            if let LayerPlan::Rule(rule) = step {
                let rule = Arc::clone(rule);
                session.track(layer.register_forward_hook(Arc::new(
                    move |layer: &Layer, inputs: &[Tensor], _output: &Tensor| {
                        rule.on_forward_weights(layer, inputs)?;
                        Ok(None)
                    },
                )));
            }
        }
        let output = self.model.forward(&input.detach())?.detach();
        session.remove_layer_hooks();
        let seed = target_seed(&output, target)?;
        log::debug!("Weight pass done on {:?}, output shape {:?}", device, output.shape());

        // Relevance pass.
        for (layer, step) in &plan {
            match step {
                LayerPlan::Rule(rule) => {
                    let pre_rule = Arc::clone(rule);
                    session.track(layer.register_forward_pre_hook(Arc::new(
                        move |layer: &Layer, inputs: &[Tensor]| pre_rule.on_forward_pre_activations(layer, inputs),
                    )));
                    let post_rule = Arc::clone(rule);
                    let substitutes = Arc::clone(&self.substitutes);
                    session.track(layer.register_forward_hook(Arc::new(
                        move |layer: &Layer, inputs: &[Tensor], output: &Tensor| {
                            post_rule
                                .on_forward(layer, inputs, output, &substitutes)
                                .map(Some)
                        },
                    )));
                }
                LayerPlan::Passthrough => session.track(layer.register_backward_hook(
                    PropagationRule::activation_passthrough(Arc::clone(&self.substitutes)),
                )),
            }
        }
        let leaf = input.detach();
        leaf.requires_grad_(true)?;
        let relevance_output = self.model.forward(&copy_op(&leaf)?)?;
        relevance_output.backward_with_grad(seed)?;
        log::debug!("Relevance pass done on {:?}", device);

        let relevance = leaf
            .grad()
            .ok_or(RelpropError::RelevanceNotComputed { device })?;
        let convergence_delta = Self::compute_convergence_delta(&relevance, &output, target)?;
        let layer_relevances = match options.layer_relevance {
            Some(mode) => Some(collect_layer_relevances(&plan, device, mode)?),
            None => None,
        };
        drop(session);

        Ok(LrpAttribution {
            relevance,
            output,
            convergence_delta,
            layer_relevances,
        })
    }

    /// Per sample, `sum(relevance[b]) - output[b, target]`.
    pub fn compute_convergence_delta(
        relevance: &Tensor,
        output: &Tensor,
        target: usize,
    ) -> Result<Vec<f32>, RelpropError> {
        let totals = sum_rows(relevance)?;
        let mut deltas = Vec::with_capacity(totals.len());
        for (b, total) in totals.into_iter().enumerate() {
            deltas.push(total - output.at(&[b, target])?);
        }
        Ok(deltas)
    }
}

/// One-hot seed carrying the target score of every sample.
fn target_seed(output: &Tensor, target: usize) -> Result<Tensor, RelpropError> {
    let shape = output.shape();
    if shape.len() != 2 {
        return Err(RelpropError::UnsupportedOperation(format!(
            "LRP expects a [batch, classes] model output, got {:?}",
            shape
        )));
    }
    let (batch, classes) = (shape[0], shape[1]);
    if target >= classes {
        return Err(RelpropError::IndexOutOfBounds {
            index: vec![target],
            shape,
        });
    }
    let scores = output.get_f32_data()?;
    let mut seed = vec![0.0; batch * classes];
    for b in 0..batch {
        let idx = b * classes + target;
        seed[idx] = scores[idx];
    }
    Tensor::new_on(seed, shape, output.device())
}

fn collect_layer_relevances(
    plan: &[(Arc<Layer>, LayerPlan)],
    device: StorageDevice,
    mode: LayerRelevanceMode,
) -> Result<Vec<LayerRelevance>, RelpropError> {
    let mut relevances = Vec::new();
    for (layer, step) in plan {
        if let LayerPlan::Rule(rule) = step {
            let relevance = match mode {
                LayerRelevanceMode::Input => rule.relevance_input(device)?,
                LayerRelevanceMode::Output => Relevance::Single(rule.relevance_output(device)?),
            };
            relevances.push(LayerRelevance {
                layer: layer.name().to_string(),
                relevance,
            });
        }
    }
    Ok(relevances)
}

struct ParameterSnapshot {
    parameter: Parameter,
    values: Vec<f32>,
    grad: Option<Tensor>,
}

/// Scope of one attribution on one device.
///
/// Dropping it puts back parameter values and gradients, removes every layer
/// and rule hook, and clears the device's cached activations and pending
/// substitutes.
struct LrpSession {
    device: StorageDevice,
    layers: Vec<Arc<Layer>>,
    rules: Vec<Arc<PropagationRule>>,
    snapshots: Vec<ParameterSnapshot>,
    layer_hooks: Vec<HookHandle>,
    substitutes: Arc<SubstituteSlots>,
}

impl LrpSession {
    fn begin(
        device: StorageDevice,
        plan: &[(Arc<Layer>, LayerPlan)],
        substitutes: Arc<SubstituteSlots>,
    ) -> Result<Self, RelpropError> {
        let mut snapshots = Vec::new();
        for (layer, _) in plan {
            for parameter in layer.parameters() {
                snapshots.push(ParameterSnapshot {
                    parameter: parameter.clone(),
                    values: parameter.snapshot()?,
                    grad: parameter.grad(),
                });
            }
        }
        let rules = plan
            .iter()
            .filter_map(|(_, step)| match step {
                LayerPlan::Rule(rule) => Some(Arc::clone(rule)),
                LayerPlan::Passthrough => None,
            })
            .collect();
        Ok(LrpSession {
            device,
            layers: plan.iter().map(|(layer, _)| Arc::clone(layer)).collect(),
            rules,
            snapshots,
            layer_hooks: Vec::new(),
            substitutes,
        })
    }

    fn track(&mut self, handle: HookHandle) {
        self.layer_hooks.push(handle);
    }

    fn remove_layer_hooks(&mut self) {
        for handle in self.layer_hooks.drain(..) {
            handle.remove();
        }
    }
}

impl Drop for LrpSession {
    fn drop(&mut self) {
        self.remove_layer_hooks();
        let released: usize = self.rules.iter().map(|rule| rule.release_hooks(self.device)).sum();
        for snapshot in self.snapshots.drain(..) {
            if let Err(err) = snapshot.parameter.restore(snapshot.values) {
                log::warn!("Could not restore parameter {:?}: {}", snapshot.parameter.name(), err);
            }
            snapshot.parameter.set_grad(snapshot.grad);
        }
        for layer in &self.layers {
            layer.clear_activations(self.device);
        }
        self.substitutes.clear_device(self.device);
        log::debug!(
            "LRP session on {:?} closed, {} tensor hooks released",
            self.device,
            released
        );
    }
}
