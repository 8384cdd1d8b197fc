use crate::device::StorageDevice;
use crate::error::RelpropError;
use crate::model::Sequential;
use crate::nn::{Linear, ReLU};
use crate::tensor::Tensor;
use crate::utils::testing::check_tensor_near;
use std::sync::Arc;

fn two_layer_model() -> Result<Sequential, RelpropError> {
    let mut model = Sequential::new();
    model.add(
        "fc1",
        Linear::from_tensors(
            Tensor::new(vec![1.0, -1.0, 0.5, 0.5], vec![2, 2])?,
            Some(Tensor::new(vec![0.0, 1.0], vec![2])?),
        )?,
    )?;
    model.add("relu", ReLU::new())?;
    model.add(
        "fc2",
        Linear::from_tensors(Tensor::new(vec![1.0, 2.0], vec![1, 2])?, None)?,
    )?;
    Ok(model)
}

#[test]
fn test_sequential_forward() -> Result<(), RelpropError> {
    let model = two_layer_model()?;
    assert_eq!(model.len(), 3);
    let x = Tensor::new(vec![1.0, 3.0, 2.0, 0.0], vec![2, 2])?;
    // fc1: [-2, 3], [2, 2]; relu: [0, 3], [2, 2]; fc2: [6], [6]
    let y = model.forward(&x)?;
    check_tensor_near(&y, &[2, 1], &[6.0, 6.0], 1e-6);
    Ok(())
}

#[test]
fn test_sequential_rejects_duplicate_names() -> Result<(), RelpropError> {
    let mut model = two_layer_model()?;
    assert!(matches!(
        model.add("relu", ReLU::new()),
        Err(RelpropError::UnsupportedOperation(_))
    ));
    Ok(())
}

#[test]
fn test_named_parameters() -> Result<(), RelpropError> {
    let model = two_layer_model()?;
    let names: Vec<String> = model.named_parameters().into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["fc1.weight", "fc1.bias", "fc2.weight"]);
    assert_eq!(model.parameters().len(), 3);
    Ok(())
}

#[test]
fn test_reused_layer_is_counted_once() -> Result<(), RelpropError> {
    let mut model = Sequential::new();
    let fc = model.add("fc", Linear::new(2, 2, true)?)?;
    model.push_layer(Arc::clone(&fc));
    assert_eq!(model.len(), 2);
    assert_eq!(model.unique_layers().len(), 1);
    assert_eq!(model.parameters().len(), 2);
    Ok(())
}

#[test]
fn test_replicate_preserves_sharing() -> Result<(), RelpropError> {
    let mut model = two_layer_model()?;
    let relu = Arc::clone(model.layer("relu").unwrap());
    model.push_layer(relu);

    let replica = model.replicate(StorageDevice::GPU(2))?;
    assert_eq!(replica.len(), 4);
    assert_eq!(replica.unique_layers().len(), 3);
    assert!(Arc::ptr_eq(&replica.layers()[1], &replica.layers()[3]));
    assert!(!Arc::ptr_eq(&replica.layers()[0], &model.layers()[0]));
    for param in replica.parameters() {
        assert_eq!(param.device(), StorageDevice::GPU(2));
    }

    let x = Tensor::new_on(vec![1.0, 3.0], vec![1, 2], StorageDevice::GPU(2))?;
    let y = replica.forward(&x)?;
    assert_eq!(y.device(), StorageDevice::GPU(2));
    Ok(())
}
