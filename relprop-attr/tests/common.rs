use rand::rngs::StdRng;
use rand::SeedableRng;
use relprop_core::model::Sequential;
use relprop_core::nn::{Linear, ReLU};
use relprop_core::tensor::randn;
use relprop_core::{RelpropError, Tensor};

// Shared by several test crates; not every helper is used by each of them.
#[allow(dead_code)]
pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[allow(dead_code)]
pub(crate) fn tensor(data: Vec<f32>, shape: Vec<usize>) -> Tensor {
    Tensor::new(data, shape).expect("Test tensor creation failed")
}

/// Linear(in, hidden) -> ReLU -> Linear(hidden, out), seeded weights and
/// optional zero biases.
#[allow(dead_code)]
pub(crate) fn mlp(
    seed: u64,
    sizes: (usize, usize, usize),
    zero_bias: bool,
) -> Result<Sequential, RelpropError> {
    let (n_in, hidden, n_out) = sizes;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut bias = |n: usize| -> Result<Tensor, RelpropError> {
        if zero_bias {
            Tensor::new(vec![0.0; n], vec![n])
        } else {
            randn(&[n], &mut rng)
        }
    };
    let b1 = bias(hidden)?;
    let b2 = bias(n_out)?;

    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));
    let mut model = Sequential::new();
    model.add("fc1", Linear::from_tensors(randn(&[hidden, n_in], &mut rng)?, Some(b1))?)?;
    model.add("relu", ReLU::new())?;
    model.add("fc2", Linear::from_tensors(randn(&[n_out, hidden], &mut rng)?, Some(b2))?)?;
    Ok(model)
}

#[allow(dead_code)]
pub(crate) fn random_input(seed: u64, batch: usize, features: usize) -> Result<Tensor, RelpropError> {
    randn(&[batch, features], &mut StdRng::seed_from_u64(seed))
}
