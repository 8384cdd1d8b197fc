use super::*;
use crate::device::StorageDevice;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn test_zeros_ones_full() -> Result<(), RelpropError> {
    let z = zeros(&[2, 3])?;
    assert_eq!(z.shape(), vec![2, 3]);
    assert!(z.get_f32_data()?.iter().all(|&x| x == 0.0));

    let o = ones(&[4])?;
    assert!(o.get_f32_data()?.iter().all(|&x| x == 1.0));

    let f = full(&[1, 2], -2.5)?;
    assert_eq!(f.get_f32_data()?, vec![-2.5, -2.5]);
    assert_eq!(f.device(), StorageDevice::CPU);
    Ok(())
}

#[test]
fn test_like_constructors_keep_device() -> Result<(), RelpropError> {
    let t = Tensor::new_on(vec![1.0, 2.0], vec![2], StorageDevice::GPU(3))?;
    let z = zeros_like(&t)?;
    let o = ones_like(&t)?;
    assert_eq!(z.device(), StorageDevice::GPU(3));
    assert_eq!(o.device(), StorageDevice::GPU(3));
    assert_eq!(z.get_f32_data()?, vec![0.0, 0.0]);
    assert_eq!(o.get_f32_data()?, vec![1.0, 1.0]);
    Ok(())
}

#[test]
fn test_random_creation_is_seeded() -> Result<(), RelpropError> {
    let a = randn(&[3, 3], &mut StdRng::seed_from_u64(7))?;
    let b = randn(&[3, 3], &mut StdRng::seed_from_u64(7))?;
    assert_eq!(a, b);

    let u = uniform(&[100], -0.5, 0.5, &mut StdRng::seed_from_u64(1))?;
    assert!(u.get_f32_data()?.iter().all(|&x| (-0.5..0.5).contains(&x)));
    assert!(uniform(&[1], 1.0, 1.0, &mut StdRng::seed_from_u64(1)).is_err());
    Ok(())
}
