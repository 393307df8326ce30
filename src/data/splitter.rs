// ============================================================
// Layer 4 — Train/Eval Splitter
// ============================================================
// Randomly permutes examples and splits them into two sets:
//   - Train set: the examples the model sees gradients from
//   - Eval set:  held-out pairs used to watch generalisation
//
// The permutation is driven by the run seed, so the same
// hyperparameters always give the same split. `inspect`
// relies on this to rebuild the eval set of a finished run.
//
// The split index is floor(total * train_fraction).

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` with a seeded RNG and split into (train, eval).
///
/// # Arguments
/// * `samples`        - All available examples (consumed by this function)
/// * `train_fraction` - Proportion for training, e.g. 0.4 = 40%
/// * `seed`           - Seed of the permutation
pub fn split_train_eval<T>(
    mut samples:    Vec<T>,
    train_fraction: f64,
    seed:           u64,
) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let split_at = ((total as f64) * train_fraction).floor() as usize;
    let split_at = split_at.min(total);

    // After this: samples = [0..split_at], eval = [split_at..total]
    let eval = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} train, {} eval (seed {})",
        samples.len(),
        eval.len(),
        seed,
    );

    (samples, eval)
}
