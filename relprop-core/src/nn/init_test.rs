use crate::nn::init::{bias_uniform, kaiming_uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn test_kaiming_uniform_bounds() {
    let mut rng = StdRng::seed_from_u64(42);
    let w = kaiming_uniform(8, 16, &mut rng).unwrap();
    assert_eq!(w.shape(), vec![8, 16]);
    let bound = 0.25;
    assert!(w.get_f32_data().unwrap().iter().all(|&x| x >= -bound && x < bound));

    let b = bias_uniform(8, 16, &mut rng).unwrap();
    assert_eq!(b.shape(), vec![8]);
    assert!(b.get_f32_data().unwrap().iter().all(|&x| x >= -bound && x < bound));
}
