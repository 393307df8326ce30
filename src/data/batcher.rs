// ============================================================
// Layer 4 — Tensor Batches
// ============================================================
// Converts a fixed `Batch` of token pairs into the three Int
// tensors the model consumes:
//
//   lhs     [batch]  first token of each pair
//   rhs     [batch]  second token of each pair
//   targets [batch]  (lhs + rhs) mod n
//
// The train and eval sets are small and fixed, so each is
// uploaded once per backend and reused for every step.

use burn::prelude::*;
use rand::Rng;

use crate::data::dataset::Batch;

/// A batch of token pairs on a device, ready for the forward pass.
#[derive(Debug, Clone)]
pub struct TensorBatch<B: Backend> {
    pub lhs:     Tensor<B, 1, Int>,
    pub rhs:     Tensor<B, 1, Int>,
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> TensorBatch<B> {
    /// Upload a batch to `device`.
    pub fn from_batch(batch: &Batch, device: &B::Device) -> Self {
        let lhs: Vec<i32> = batch.inputs.iter().map(|p| p[0] as i32).collect();
        let rhs: Vec<i32> = batch.inputs.iter().map(|p| p[1] as i32).collect();
        let targets: Vec<i32> = batch.targets.iter().map(|&t| t as i32).collect();

        Self {
            lhs:     Tensor::<B, 1, Int>::from_ints(lhs.as_slice(), device),
            rhs:     Tensor::<B, 1, Int>::from_ints(rhs.as_slice(), device),
            targets: Tensor::<B, 1, Int>::from_ints(targets.as_slice(), device),
        }
    }

    pub fn len(&self) -> usize {
        self.targets.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Draw `size` distinct examples. Returns the whole batch if `size` covers it.
    pub fn sample<R: Rng + ?Sized>(&self, size: usize, rng: &mut R) -> Self {
        let total = self.len();
        if size >= total {
            return self.clone();
        }

        let picked: Vec<i32> = rand::seq::index::sample(rng, total, size)
            .into_iter()
            .map(|i| i as i32)
            .collect();
        let index = Tensor::<B, 1, Int>::from_ints(picked.as_slice(), &self.targets.device());

        Self {
            lhs:     self.lhs.clone().select(0, index.clone()),
            rhs:     self.rhs.clone().select(0, index.clone()),
            targets: self.targets.clone().select(0, index),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use rand::{rngs::StdRng, SeedableRng};

    type TestBackend = NdArray;

    fn to_vec(t: Tensor<TestBackend, 1, Int>) -> Vec<i64> {
        t.into_data().convert::<i64>().to_vec::<i64>().unwrap()
    }

    #[test]
    fn test_from_batch_splits_columns() {
        let device = Default::default();
        let batch  = Batch { inputs: vec![[1, 2], [3, 4], [5, 0]], targets: vec![3, 0, 5] };
        let tb     = TensorBatch::<TestBackend>::from_batch(&batch, &device);

        assert_eq!(tb.len(), 3);
        assert_eq!(to_vec(tb.lhs),     vec![1, 3, 5]);
        assert_eq!(to_vec(tb.rhs),     vec![2, 4, 0]);
        assert_eq!(to_vec(tb.targets), vec![3, 0, 5]);
    }

    #[test]
    fn test_sample_keeps_rows_aligned() {
        let device = Default::default();
        let n      = 7u32;
        let inputs: Vec<[u32; 2]> = (0..n).map(|a| [a, (a + 1) % n]).collect();
        let targets = inputs.iter().map(|&[a, b]| (a + b) % n).collect();
        let tb = TensorBatch::<TestBackend>::from_batch(&Batch { inputs, targets }, &device);

        let mut rng = StdRng::seed_from_u64(0);
        let sub     = tb.sample(4, &mut rng);
        assert_eq!(sub.len(), 4);

        let lhs = to_vec(sub.lhs);
        let rhs = to_vec(sub.rhs);
        let tgt = to_vec(sub.targets);
        for i in 0..4 {
            assert_eq!((lhs[i] + rhs[i]) % n as i64, tgt[i]);
        }
        let mut distinct = lhs.clone();
        distinct.sort_unstable();
        distinct.dedup();
        assert_eq!(distinct.len(), 4);
    }

    #[test]
    fn test_sample_larger_than_batch_returns_all() {
        let device = Default::default();
        let batch  = Batch { inputs: vec![[0, 1], [1, 1]], targets: vec![1, 2] };
        let tb     = TensorBatch::<TestBackend>::from_batch(&batch, &device);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(tb.sample(10, &mut rng).len(), 2);
    }
}
