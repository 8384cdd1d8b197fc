use crate::tensor::Tensor;

/// Asserts that `actual` has `expected_shape` and that every element lies
/// within `tolerance` of `expected_data`.
///
/// All offending positions are listed in the panic message, not only the
/// first one, which makes relevance maps easier to debug.
pub fn check_tensor_near(actual: &Tensor, expected_shape: &[usize], expected_data: &[f32], tolerance: f32) {
    let shape = actual.shape();
    assert_eq!(shape, expected_shape, "shape of {:?}", actual);

    let values = match actual.get_f32_data() {
        Ok(values) => values,
        Err(err) => panic!("cannot read {:?}: {}", actual, err),
    };
    assert_eq!(values.len(), expected_data.len(), "element count of {:?}", actual);

    let mismatches: Vec<String> = values
        .iter()
        .zip(expected_data)
        .enumerate()
        .filter(|(_, (got, want))| (*got - *want).abs() > tolerance)
        .map(|(i, (got, want))| format!("[{}] {} vs {}", i, got, want))
        .collect();
    assert!(
        mismatches.is_empty(),
        "{} of {} elements off by more than {} on {:?}: {}",
        mismatches.len(),
        values.len(),
        tolerance,
        actual.device(),
        mismatches.join(", ")
    );
}

/// CPU tensor from raw values; panics on a shape/length mismatch.
#[allow(dead_code)]
pub(crate) fn create_test_tensor(data: Vec<f32>, shape: Vec<usize>) -> Tensor {
    match Tensor::new(data, shape) {
        Ok(tensor) => tensor,
        Err(err) => panic!("bad test tensor: {}", err),
    }
}

/// Same as [`create_test_tensor`], marked as a leaf requiring grad.
#[allow(dead_code)]
pub(crate) fn create_test_tensor_with_grad(data: Vec<f32>, shape: Vec<usize>) -> Tensor {
    let tensor = create_test_tensor(data, shape);
    if let Err(err) = tensor.requires_grad_(true) {
        panic!("fresh tensor refused requires_grad: {}", err);
    }
    tensor
}
