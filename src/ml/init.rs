// ============================================================
// Layer 5 — Parameter Initialisers
// ============================================================
// Weights are drawn on the host from a seeded StdRng and then
// uploaded, so a seed gives bit-identical parameters on every
// backend (NdArray, WGPU) and every run.
//
// Two schemes:
//   variance_scaling(2)  embeddings / unembedding
//                        stddev = sqrt(2 / fan_in) / 0.8796...
//   truncated_normal     dense layers
//                        stddev = 1 / sqrt(fan_in)
//
// Both draw from a normal truncated at ±2 standard deviations.
// The 0.8796 factor restores the requested variance after the
// tails are cut off. Fan-in of an [rows, cols] matrix is rows.

use burn::prelude::*;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// Standard deviation of a unit normal truncated to [-2, 2].
const TRUNCATED_NORMAL_STDDEV: f64 = 0.879_625_661_034_239_8;

/// Truncated-normal samples with the given stddev, rejection-sampled.
pub fn truncated_normal<R: Rng + ?Sized>(rng: &mut R, count: usize, stddev: f64) -> Vec<f32> {
    let mut values = Vec::with_capacity(count);
    while values.len() < count {
        let z: f64 = StandardNormal.sample(rng);
        if z.abs() <= 2.0 {
            values.push((z * stddev) as f32);
        }
    }
    values
}

/// He-style variance scaling (scale 2, fan-in mode) for an `[rows, cols]` matrix.
pub fn variance_scaling<B: Backend, R: Rng + ?Sized>(
    rng:    &mut R,
    shape:  [usize; 2],
    device: &B::Device,
) -> Tensor<B, 2> {
    let fan_in = shape[0] as f64;
    let stddev = (2.0 / fan_in).sqrt() / TRUNCATED_NORMAL_STDDEV;
    matrix(truncated_normal(rng, shape[0] * shape[1], stddev), shape, device)
}

/// Default dense-layer init for an `[input, output]` weight.
pub fn dense<B: Backend, R: Rng + ?Sized>(
    rng:    &mut R,
    shape:  [usize; 2],
    device: &B::Device,
) -> Tensor<B, 2> {
    let stddev = 1.0 / (shape[0] as f64).sqrt();
    matrix(truncated_normal(rng, shape[0] * shape[1], stddev), shape, device)
}

fn matrix<B: Backend>(values: Vec<f32>, shape: [usize; 2], device: &B::Device) -> Tensor<B, 2> {
    Tensor::from_data(TensorData::new(values, shape), device)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_truncation_bound() {
        let mut rng = StdRng::seed_from_u64(1);
        let values  = truncated_normal(&mut rng, 10_000, 0.5);
        assert!(values.iter().all(|v| v.abs() <= 1.0));
    }

    #[test]
    fn test_variance_scaling_stddev() {
        let mut rng = StdRng::seed_from_u64(2);
        let fan_in  = 50.0_f64;
        let stddev  = (2.0 / fan_in).sqrt() / TRUNCATED_NORMAL_STDDEV;
        let values  = truncated_normal(&mut rng, 200_000, stddev);

        let mean = values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64;
        let var  = values.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>()
            / values.len() as f64;
        // The truncation correction brings the empirical variance back to 2 / fan_in
        assert!((var - 2.0 / fan_in).abs() < 0.002, "variance {var}");
    }

    #[test]
    fn test_same_seed_same_values() {
        let a = truncated_normal(&mut StdRng::seed_from_u64(7), 64, 1.0);
        let b = truncated_normal(&mut StdRng::seed_from_u64(7), 64, 1.0);
        assert_eq!(a, b);
    }
}
