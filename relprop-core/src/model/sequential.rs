use crate::device::StorageDevice;
use crate::error::RelpropError;
use crate::nn::layer::Layer;
use crate::nn::module::Module;
use crate::nn::parameter::Parameter;
use crate::tensor::Tensor;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A chain of single-input layers.
///
/// Layers are shared `Arc<Layer>`s, so the same layer can be pushed more than
/// once (see [`Sequential::push_layer`]); relevance propagation rejects such
/// models at attribution time.
#[derive(Debug, Default, Clone)]
pub struct Sequential {
    layers: Vec<Arc<Layer>>,
    named_layers: BTreeMap<String, usize>,
}

impl Sequential {
    pub fn new() -> Self {
        Sequential {
            layers: Vec::new(),
            named_layers: BTreeMap::new(),
        }
    }

    /// Appends `module` under `name`. Names must be unique.
    pub fn add(&mut self, name: &str, module: impl Module + 'static) -> Result<Arc<Layer>, RelpropError> {
        self.add_module(name, Box::new(module))
    }

    pub fn add_module(&mut self, name: &str, module: Box<dyn Module>) -> Result<Arc<Layer>, RelpropError> {
        if self.named_layers.contains_key(name) {
            return Err(RelpropError::UnsupportedOperation(format!(
                "Sequential already has a layer named '{}'",
                name
            )));
        }
        let layer = Arc::new(Layer::from_boxed(name, module));
        self.push_layer(Arc::clone(&layer));
        Ok(layer)
    }

    /// Appends an existing layer. Pushing a layer that is already part of the
    /// model makes it run twice per forward pass.
    pub fn push_layer(&mut self, layer: Arc<Layer>) {
        let index = self.layers.len();
        self.named_layers
            .entry(layer.name().to_string())
            .or_insert(index);
        self.layers.push(layer);
    }

    /// Layers in execution order, repeats included.
    pub fn layers(&self) -> &[Arc<Layer>] {
        &self.layers
    }

    pub fn layer(&self, name: &str) -> Option<&Arc<Layer>> {
        self.named_layers.get(name).and_then(|&index| self.layers.get(index))
    }

    /// Each distinct layer once, in order of first use.
    pub fn unique_layers(&self) -> Vec<Arc<Layer>> {
        let mut unique: Vec<Arc<Layer>> = Vec::new();
        for layer in &self.layers {
            if !unique.iter().any(|seen| Arc::ptr_eq(seen, layer)) {
                unique.push(Arc::clone(layer));
            }
        }
        unique
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn forward(&self, input: &Tensor) -> Result<Tensor, RelpropError> {
        let mut current = input.clone();
        for layer in &self.layers {
            current = layer.call(&[current])?;
        }
        Ok(current)
    }

    pub fn parameters(&self) -> Vec<Parameter> {
        self.unique_layers()
            .iter()
            .flat_map(|layer| layer.parameters().into_iter().cloned().collect::<Vec<_>>())
            .collect()
    }

    pub fn named_parameters(&self) -> Vec<(String, Parameter)> {
        let mut params = Vec::new();
        for layer in self.unique_layers() {
            for (param_name, param) in layer.module().named_parameters() {
                params.push((format!("{}.{}", layer.name(), param_name), param.clone()));
            }
        }
        params
    }

    /// Deep copy with every parameter on `device`. A layer used at several
    /// positions is replicated once and shared the same way in the copy.
    pub fn replicate(&self, device: StorageDevice) -> Result<Sequential, RelpropError> {
        let mut replicas: HashMap<*const Layer, Arc<Layer>> = HashMap::new();
        let mut model = Sequential::new();
        for layer in &self.layers {
            let key = Arc::as_ptr(layer);
            let replica = match replicas.get(&key) {
                Some(replica) => Arc::clone(replica),
                None => {
                    let replica = Arc::new(layer.replicate(device)?);
                    replicas.insert(key, Arc::clone(&replica));
                    replica
                }
            };
            model.push_layer(replica);
        }
        Ok(model)
    }
}

#[cfg(test)]
#[path = "sequential_test.rs"]
mod tests;
