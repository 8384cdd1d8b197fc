use crate::device::StorageDevice;
use crate::error::RelpropError;
use crate::nn::{LayerKind, Linear, Module};
use crate::tensor::Tensor;
use crate::utils::testing::check_tensor_near;

#[test]
fn test_linear_creation() -> Result<(), RelpropError> {
    let linear = Linear::new(10, 5, true)?;
    assert_eq!(linear.weight.shape(), vec![5, 10]);
    assert!(linear.weight.requires_grad());
    let bias = linear.bias.as_ref().expect("bias");
    assert_eq!(bias.shape(), vec![5]);
    assert!(bias.requires_grad());
    assert_eq!(linear.kind(), LayerKind::Linear);
    assert_eq!(linear.parameters().len(), 2);

    let no_bias = Linear::new(3, 2, false)?;
    assert!(no_bias.bias().is_none());
    assert_eq!(no_bias.named_parameters()[0].0, "weight");
    Ok(())
}

#[test]
fn test_linear_forward_with_explicit_weights() -> Result<(), RelpropError> {
    let weight = Tensor::new(vec![1.0, 0.0, -1.0, 0.0, 1.0, 0.0], vec![2, 3])?;
    let bias = Tensor::new(vec![0.5, -0.5], vec![2])?;
    let linear = Linear::from_tensors(weight, Some(bias))?;
    let input = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3])?;
    let output = linear.forward(&[input])?;
    check_tensor_near(&output, &[2, 2], &[-1.5, 1.5, -1.5, 4.5], 1e-6);
    Ok(())
}

#[test]
fn test_linear_rejects_extra_inputs() -> Result<(), RelpropError> {
    let linear = Linear::new(2, 2, false)?;
    let x = Tensor::new(vec![1.0, 2.0], vec![1, 2])?;
    assert!(matches!(
        linear.forward(&[x.clone(), x]),
        Err(RelpropError::InputArity { expected: 1, actual: 2, .. })
    ));
    Ok(())
}

#[test]
fn test_linear_replicate_moves_parameters() -> Result<(), RelpropError> {
    let linear = Linear::new(2, 3, true)?;
    let replica = linear.replicate(StorageDevice::GPU(1))?;
    let weight = replica.weight().expect("weight");
    assert_eq!(weight.device(), StorageDevice::GPU(1));
    assert_eq!(weight.get_f32_data()?, linear.weight.get_f32_data()?);
    assert_ne!(weight.node_id(), linear.weight.node_id());
    Ok(())
}
