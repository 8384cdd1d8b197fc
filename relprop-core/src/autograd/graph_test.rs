use super::*;
use crate::autograd::BackwardOp;
use crate::ops::{add_op, mul_op, sum_op};
use crate::utils::testing::{check_tensor_near, create_test_tensor, create_test_tensor_with_grad};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug)]
struct FixedBackward {
    inputs: Vec<Tensor>,
    grads: usize,
}

impl BackwardOp for FixedBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, RelpropError> {
        Ok((0..self.grads).map(|_| grad_output.detach()).collect())
    }

    fn inputs(&self) -> Vec<Tensor> {
        self.inputs.clone()
    }
}

#[test]
fn test_topological_sort_puts_inputs_first() -> Result<(), RelpropError> {
    let a = create_test_tensor_with_grad(vec![1.0, 2.0], vec![2]);
    let b = create_test_tensor_with_grad(vec![3.0, 4.0], vec![2]);
    let c = mul_op(&a, &b)?;
    let d = add_op(&c, &a)?;
    let order = topological_sort(&d)?;

    let position = |t: &Tensor| order.iter().position(|n| n.node_id() == t.node_id()).unwrap();
    assert_eq!(order.len(), 4);
    assert_eq!(position(&d), 3);
    assert!(position(&a) < position(&c));
    assert!(position(&b) < position(&c));
    Ok(())
}

#[test]
fn test_cycle_is_detected() {
    let t = create_test_tensor(vec![1.0], vec![1]);
    t.set_grad_fn(Arc::new(FixedBackward {
        inputs: vec![t.clone()],
        grads: 1,
    }));
    assert_eq!(topological_sort(&t).unwrap_err(), RelpropError::CycleDetected);
    // Break the Arc cycle.
    t.write_data().grad_fn = None;
}

#[test]
fn test_gradient_count_mismatch() -> Result<(), RelpropError> {
    let a = create_test_tensor_with_grad(vec![1.0], vec![1]);
    let out = create_test_tensor(vec![1.0], vec![1]);
    out.set_grad_fn(Arc::new(FixedBackward {
        inputs: vec![a],
        grads: 2,
    }));
    assert_eq!(
        out.backward().unwrap_err(),
        RelpropError::GradientCountMismatch { expected: 1, actual: 2 }
    );
    Ok(())
}

#[test]
fn test_leaf_used_twice_accumulates() -> Result<(), RelpropError> {
    let a = create_test_tensor_with_grad(vec![1.0, -1.0], vec![2]);
    let b = add_op(&a, &a)?;
    sum_op(&b)?.backward()?;
    check_tensor_near(&a.grad().unwrap(), &[2], &[2.0, 2.0], 1e-6);
    Ok(())
}

#[test]
fn test_hooks_run_in_order_and_replace_gradient() -> Result<(), RelpropError> {
    let a = create_test_tensor_with_grad(vec![1.0, 2.0], vec![2]);
    let two = create_test_tensor(vec![2.0, 2.0], vec![2]);
    let b = mul_op(&a, &two)?;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let _first = b.register_hook(|grad| {
        let scaled: Vec<f32> = grad.get_f32_data()?.iter().map(|g| g * 10.0).collect();
        Ok(Some(Tensor::new(scaled, grad.shape())?))
    });
    let s = Arc::clone(&seen);
    let _second = b.register_hook(move |grad| {
        s.lock().unwrap().push(grad.get_f32_data()?);
        Ok(None)
    });

    sum_op(&b)?.backward()?;
    assert_eq!(*seen.lock().unwrap(), vec![vec![10.0, 10.0]]);
    check_tensor_near(&a.grad().unwrap(), &[2], &[20.0, 20.0], 1e-6);
    Ok(())
}

#[test]
fn test_hook_fires_once_on_accumulated_gradient() -> Result<(), RelpropError> {
    let a = create_test_tensor_with_grad(vec![1.0, 2.0], vec![2]);
    let b = mul_op(&a, &a)?;
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (c, s) = (Arc::clone(&calls), Arc::clone(&seen));
    let _handle = b.register_hook(move |grad| {
        c.fetch_add(1, Ordering::SeqCst);
        s.lock().unwrap().push(grad.get_f32_data()?);
        Ok(None)
    });

    let d = add_op(&b, &b)?;
    sum_op(&d)?.backward()?;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(*seen.lock().unwrap(), vec![vec![2.0, 2.0]]);
    // d = 2a^2, dd/da = 4a
    check_tensor_near(&a.grad().unwrap(), &[2], &[4.0, 8.0], 1e-6);
    Ok(())
}

#[test]
fn test_leaf_hook_runs_before_accumulation() -> Result<(), RelpropError> {
    let a = create_test_tensor_with_grad(vec![1.0, 2.0], vec![2]);
    let _handle = a.register_hook(|grad| Ok(Some(crate::tensor::zeros_like(grad)?)));
    sum_op(&a)?.backward()?;
    check_tensor_near(&a.grad().unwrap(), &[2], &[0.0, 0.0], 1e-6);
    Ok(())
}

#[test]
fn test_removed_hook_no_longer_fires() -> Result<(), RelpropError> {
    let a = create_test_tensor_with_grad(vec![1.0], vec![1]);
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let handle = a.register_labeled_hook("count", move |_| {
        c.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    });
    assert!(a.has_hook("count"));
    assert!(!a.has_hook("other"));

    sum_op(&a)?.backward()?;
    handle.remove();
    assert!(!a.has_hook("count"));
    assert_eq!(a.hook_count(), 0);

    sum_op(&a)?.backward()?;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    check_tensor_near(&a.grad().unwrap(), &[1], &[2.0], 1e-6);
    Ok(())
}

#[test]
fn test_hook_error_aborts_backward() -> Result<(), RelpropError> {
    let a = create_test_tensor_with_grad(vec![1.0], vec![1]);
    let _handle = a.register_hook(|_| Err(RelpropError::InternalError("boom".to_string())));
    assert_eq!(
        sum_op(&a)?.backward().unwrap_err(),
        RelpropError::InternalError("boom".to_string())
    );
    assert!(a.grad().is_none());
    Ok(())
}

#[test]
fn test_sibling_hooks_fire_in_argument_order() -> Result<(), RelpropError> {
    let a = create_test_tensor_with_grad(vec![1.0], vec![1]);
    let b = create_test_tensor_with_grad(vec![2.0], vec![1]);
    let a2 = mul_op(&a, &a)?;
    let b2 = mul_op(&b, &b)?;
    let fired = Arc::new(Mutex::new(Vec::new()));
    let mut handles = Vec::new();
    for (name, tensor) in [("a", &a2), ("b", &b2)] {
        let f = Arc::clone(&fired);
        handles.push(tensor.register_hook(move |_| {
            f.lock().unwrap().push(name);
            Ok(None)
        }));
    }
    sum_op(&add_op(&a2, &b2)?)?.backward()?;
    assert_eq!(*fired.lock().unwrap(), vec!["a", "b"]);
    Ok(())
}
