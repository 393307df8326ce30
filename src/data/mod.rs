// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// The task is tiny and fully enumerable, so the pipeline is
// short:
//
//   all (a, b) pairs mod n
//       │
//       ▼
//   targets           → (a + b) mod n
//       │
//       ▼
//   splitter          → seeded permutation, train / eval
//       │
//       ▼
//   TensorBatch       → Int tensors on the training device

/// Pair enumeration, labels and the fixed train/eval batches
pub mod dataset;

/// Uploads batches as tensors; mini-batch sampling
pub mod batcher;

/// Seeded shuffle and split into train / eval
pub mod splitter;
