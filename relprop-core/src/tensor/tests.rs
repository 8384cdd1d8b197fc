use super::*;
use crate::ops::sum_op;
use crate::utils::testing::create_test_tensor_with_grad;

#[test]
fn test_tensor_creation() -> Result<(), RelpropError> {
    let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2])?;
    assert_eq!(t.shape(), vec![2, 2]);
    assert_eq!(t.numel(), 4);
    assert_eq!(t.device(), StorageDevice::CPU);
    assert_eq!(t.at(&[1, 0])?, 3.0);
    assert!(!t.requires_grad());
    Ok(())
}

#[test]
fn test_tensor_creation_error() {
    match Tensor::new(vec![1.0, 2.0, 3.0], vec![2, 2]) {
        Err(RelpropError::TensorCreationError { data_len, shape }) => {
            assert_eq!(data_len, 3);
            assert_eq!(shape, vec![2, 2]);
        }
        other => panic!("expected TensorCreationError, got {:?}", other),
    }
}

#[test]
fn test_at_out_of_bounds() -> Result<(), RelpropError> {
    let t = Tensor::new(vec![1.0, 2.0], vec![1, 2])?;
    assert!(matches!(t.at(&[1, 0]), Err(RelpropError::IndexOutOfBounds { .. })));
    assert!(matches!(t.at(&[0]), Err(RelpropError::IndexOutOfBounds { .. })));
    Ok(())
}

#[test]
fn test_item() -> Result<(), RelpropError> {
    assert_eq!(Tensor::new(vec![5.0], vec![1, 1])?.item()?, 5.0);
    assert!(Tensor::new(vec![5.0, 6.0], vec![2])?.item().is_err());
    Ok(())
}

#[test]
fn test_clone_shares_node() -> Result<(), RelpropError> {
    let t = Tensor::new(vec![1.0], vec![1])?;
    let c = t.clone();
    assert_eq!(t.node_id(), c.node_id());
    c.set_data(vec![2.0])?;
    assert_eq!(t.get_f32_data()?, vec![2.0]);
    Ok(())
}

#[test]
fn test_set_data_keeps_node_and_detached_snapshot() -> Result<(), RelpropError> {
    let t = Tensor::new(vec![1.0, 2.0], vec![2])?;
    let id = t.node_id();
    let snapshot = t.detach();
    t.set_data(vec![3.0, 4.0])?;
    assert_eq!(t.node_id(), id);
    assert_eq!(t.get_f32_data()?, vec![3.0, 4.0]);
    assert_eq!(snapshot.get_f32_data()?, vec![1.0, 2.0]);
    assert!(t.set_data(vec![1.0]).is_err());
    Ok(())
}

#[test]
fn test_set_data_from() -> Result<(), RelpropError> {
    let t = Tensor::new(vec![1.0, 2.0], vec![2])?;
    let source = Tensor::new(vec![7.0, 8.0], vec![2])?;
    t.set_data_from(&source)?;
    assert_eq!(t.get_f32_data()?, vec![7.0, 8.0]);
    let wrong = Tensor::new(vec![7.0, 8.0], vec![1, 2])?;
    assert!(matches!(t.set_data_from(&wrong), Err(RelpropError::ShapeMismatch { .. })));
    Ok(())
}

#[test]
fn test_to_device_is_detached() -> Result<(), RelpropError> {
    let t = create_test_tensor_with_grad(vec![1.0, 2.0], vec![2]);
    let moved = t.to_device(StorageDevice::GPU(1));
    assert_eq!(moved.device(), StorageDevice::GPU(1));
    assert!(!moved.requires_grad());
    assert_eq!(moved.get_f32_data()?, t.get_f32_data()?);
    assert_ne!(moved, t);
    Ok(())
}

#[test]
fn test_requires_grad_on_non_leaf_fails() -> Result<(), RelpropError> {
    let a = create_test_tensor_with_grad(vec![1.0], vec![1]);
    let s = sum_op(&a)?;
    assert!(s.requires_grad());
    assert_eq!(s.requires_grad_(false), Err(RelpropError::RequiresGradOnNonLeaf));
    Ok(())
}

#[test]
fn test_backward_preconditions() -> Result<(), RelpropError> {
    let plain = Tensor::new(vec![1.0], vec![1])?;
    assert_eq!(plain.backward(), Err(RelpropError::RequiresGradNotMet));

    let a = create_test_tensor_with_grad(vec![1.0, 2.0], vec![2]);
    assert_eq!(a.backward(), Err(RelpropError::BackwardNonScalar));
    let bad_seed = Tensor::new(vec![1.0], vec![1])?;
    assert!(matches!(
        a.backward_with_grad(bad_seed),
        Err(RelpropError::ShapeMismatch { .. })
    ));
    Ok(())
}

#[test]
fn test_grad_set_and_zero() -> Result<(), RelpropError> {
    let a = create_test_tensor_with_grad(vec![1.0, 2.0], vec![2]);
    sum_op(&a)?.backward()?;
    let saved = a.grad();
    assert!(saved.is_some());
    a.zero_grad();
    assert!(a.grad().is_none());
    a.set_grad(saved);
    assert_eq!(a.grad().unwrap().get_f32_data()?, vec![1.0, 1.0]);
    Ok(())
}
