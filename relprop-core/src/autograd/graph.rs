use crate::error::RelpropError;
use crate::tensor::Tensor;
use crate::tensor_data::TensorData;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// Identity of a graph node: the address of the tensor's shared `TensorData`.
///
/// Stable across `Tensor` clones. Only meaningful while some handle keeps the
/// node alive, which the graph and the attribution session guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn of(data: &Arc<RwLock<TensorData>>) -> Self {
        NodeId(Arc::as_ptr(data) as usize)
    }
}

/// Builds a topological ordering of the graph reachable from `root`.
///
/// The result is in post-order: every node appears after all of its inputs,
/// so `root` is last. Walking it backwards, the inputs of a node are reached
/// in argument order. Uses an explicit stack to stay safe on deep graphs.
pub(crate) fn topological_sort(root: &Tensor) -> Result<Vec<Tensor>, RelpropError> {
    let mut sorted = Vec::new();
    let mut done: HashSet<NodeId> = HashSet::new();
    let mut on_path: HashSet<NodeId> = HashSet::new();
    // (node, inputs_pushed)
    let mut stack: Vec<(Tensor, bool)> = vec![(root.clone(), false)];

    while let Some((node, expanded)) = stack.pop() {
        let id = node.node_id();
        if expanded {
            on_path.remove(&id);
            if done.insert(id) {
                sorted.push(node);
            }
            continue;
        }
        if done.contains(&id) {
            continue;
        }
        if !on_path.insert(id) {
            return Err(RelpropError::CycleDetected);
        }
        let inputs = node.grad_fn().map(|op| op.inputs()).unwrap_or_default();
        stack.push((node, true));
        // Pushed in argument order, so the last input finishes first and the
        // reversed order visits earlier inputs first.
        for input in inputs {
            let input_id = input.node_id();
            if on_path.contains(&input_id) {
                return Err(RelpropError::CycleDetected);
            }
            if !done.contains(&input_id) {
                stack.push((input, false));
            }
        }
    }
    Ok(sorted)
}

/// Propagates `seed` backward from `root`.
///
/// Gradients are summed per node before the node is visited. On visit the
/// node's gradient hooks run in registration order, then the gradient either
/// goes to `grad_fn` or, on a leaf requiring grad, is accumulated into `grad`.
pub(crate) fn run_backward(root: &Tensor, seed: Tensor) -> Result<(), RelpropError> {
    let order = topological_sort(root)?;
    log::debug!("Running backward over {} graph nodes", order.len());

    let mut grads: HashMap<NodeId, Tensor> = HashMap::new();
    grads.insert(root.node_id(), seed);

    for node in order.iter().rev() {
        let Some(grad) = grads.remove(&node.node_id()) else {
            continue;
        };
        let grad = node.apply_grad_hooks(grad)?;

        match node.grad_fn() {
            Some(op) => {
                let inputs = op.inputs();
                let input_grads = op.backward(&grad)?;
                if input_grads.len() != inputs.len() {
                    return Err(RelpropError::GradientCountMismatch {
                        expected: inputs.len(),
                        actual: input_grads.len(),
                    });
                }
                for (input, input_grad) in inputs.iter().zip(input_grads) {
                    if input.requires_grad() {
                        accumulate(&mut grads, input, input_grad)?;
                    }
                }
            }
            None => {
                if node.requires_grad() {
                    node.acc_grad(grad)?;
                }
            }
        }
    }
    Ok(())
}

fn accumulate(
    grads: &mut HashMap<NodeId, Tensor>,
    input: &Tensor,
    grad: Tensor,
) -> Result<(), RelpropError> {
    let expected = input.shape();
    if grad.shape() != expected {
        return Err(RelpropError::GradientAccumulationShapeMismatch {
            expected,
            actual: grad.shape(),
        });
    }
    let id = input.node_id();
    let summed = match grads.remove(&id) {
        Some(existing) => {
            let data: Vec<f32> = existing
                .buffer()
                .iter()
                .zip(grad.buffer().iter())
                .map(|(a, b)| a + b)
                .collect();
            Tensor::new_on(data, expected, grad.device())?
        }
        None => grad,
    };
    grads.insert(id, summed);
    Ok(())
}

#[cfg(test)]
#[path = "graph_test.rs"]
mod tests;
