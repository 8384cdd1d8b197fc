use super::*;
use crate::ops::sum_op;
use crate::utils::testing::{check_tensor_near, create_test_tensor, create_test_tensor_with_grad};

#[test]
fn test_linear_forward_with_bias() -> Result<(), RelpropError> {
    let input = create_test_tensor(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
    let weight = create_test_tensor(vec![1.0, 0.0, -1.0, 0.0, 1.0, 0.0], vec![2, 3]);
    let bias = create_test_tensor(vec![0.5, -0.5], vec![2]);
    let output = linear_op(&input, &weight, Some(&bias))?;
    check_tensor_near(&output, &[2, 2], &[-1.5, 1.5, -1.5, 4.5], 1e-6);
    assert!(!output.requires_grad());
    Ok(())
}

#[test]
fn test_linear_backward() -> Result<(), RelpropError> {
    let input = create_test_tensor_with_grad(vec![1.0, 2.0], vec![1, 2]);
    let weight = create_test_tensor_with_grad(vec![3.0, 4.0, 5.0, 6.0], vec![2, 2]);
    let bias = create_test_tensor_with_grad(vec![0.0, 0.0], vec![2]);
    let output = linear_op(&input, &weight, Some(&bias))?;
    check_tensor_near(&output, &[1, 2], &[11.0, 17.0], 1e-6);

    sum_op(&output)?.backward()?;
    // d/dx sum(xW^T) = column sums of W
    check_tensor_near(&input.grad().expect("input grad"), &[1, 2], &[8.0, 10.0], 1e-6);
    check_tensor_near(&weight.grad().expect("weight grad"), &[2, 2], &[1.0, 2.0, 1.0, 2.0], 1e-6);
    check_tensor_near(&bias.grad().expect("bias grad"), &[2], &[1.0, 1.0], 1e-6);
    Ok(())
}

#[test]
fn test_linear_incompatible_shapes() {
    let input = create_test_tensor(vec![1.0, 2.0, 3.0], vec![1, 3]);
    let weight = create_test_tensor(vec![1.0, 2.0], vec![1, 2]);
    assert!(matches!(
        linear_op(&input, &weight, None),
        Err(RelpropError::IncompatibleShapes { .. })
    ));
}
