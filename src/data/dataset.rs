// ============================================================
// Layer 4 — Modular Addition Dataset
// ============================================================
// The whole task fits in memory: every pair (a, b) with
// a, b in [0, n) labelled with (a + b) mod n.
//
// With symmetric input only the upper triangle a <= b is kept,
// since addition commutes and (b, a) carries no new information.
//   n = 67 → 67 * 68 / 2 = 2278 pairs
//
// The pairs are split once into a fixed train batch and a
// fixed eval batch. Training never reshuffles them.

use serde::{Deserialize, Serialize};

use crate::data::splitter::split_train_eval;
use crate::domain::hyper::Hyper;

/// A fixed set of examples: token pairs and their sums mod n.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub inputs:  Vec<[u32; 2]>,
    pub targets: Vec<u32>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Inputs flattened row-major to `[len, 2]` int32, the layout of `train_batch.npy`.
    pub fn inputs_flat(&self) -> Vec<i32> {
        self.inputs
            .iter()
            .flat_map(|&[a, b]| [a as i32, b as i32])
            .collect()
    }
}

/// Every ordered pair of tokens, sorted by a then b.
pub fn all_pairs(n_tokens: usize, symmetric: bool) -> Vec<[u32; 2]> {
    let n = n_tokens as u32;
    (0..n)
        .flat_map(|a| (0..n).map(move |b| [a, b]))
        .filter(|&[a, b]| !symmetric || a <= b)
        .collect()
}

/// `(a + b) mod n` for each pair.
pub fn targets(pairs: &[[u32; 2]], n_tokens: usize) -> Vec<u32> {
    let n = n_tokens as u32;
    pairs.iter().map(|&[a, b]| (a + b) % n).collect()
}

pub struct ModularDataset;

impl ModularDataset {
    /// Build the (train, eval) batches for a run.
    pub fn generate(hyper: &Hyper) -> (Batch, Batch) {
        let pairs    = all_pairs(hyper.n_tokens, hyper.is_symmetric_input);
        let labels   = targets(&pairs, hyper.n_tokens);
        let examples: Vec<([u32; 2], u32)> = pairs.into_iter().zip(labels).collect();

        let (train, eval) = split_train_eval(examples, hyper.percent_train, hyper.seed);
        (into_batch(train), into_batch(eval))
    }
}

fn into_batch(examples: Vec<([u32; 2], u32)>) -> Batch {
    let (inputs, targets) = examples.into_iter().unzip();
    Batch { inputs, targets }
}
