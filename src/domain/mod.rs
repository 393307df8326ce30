// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types describing a grokking run. No burn types,
// no file I/O beyond reading a hyperparameter file.

/// Hyperparameter set, architecture switches and their validation
pub mod hyper;
