// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates the other layers to accomplish one
// goal: train a run, or inspect a finished one.
//
// Rules for this layer:
//   - No tensor math here (that's Layer 5)
//   - No argument parsing here (that's Layer 1)
//   - Only workflow coordination

/// Generate data, train, persist and plot one run
pub mod train_use_case;

/// Reload a finished run and analyse what it learned
pub mod inspect_use_case;
