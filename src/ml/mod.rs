// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All burn-specific code lives here.
//
//   init.rs     — seeded weight initialisers
//   model.rs    — the configurable two-layer network,
//                 cross-entropy loss and accuracy
//   optim.rs    — AdamW (L2) and Adam + sign penalty (L1)
//   trainer.rs  — training state, update step, loop
//   fourier.rs  — Fourier basis over token indices and the
//                 frequency analysis of learned embeddings
//
// Backend: NdArray on the CPU by default. Build with
// `--features wgpu` to train on the GPU instead.

/// Seeded variance-scaling and truncated-normal initialisers
pub mod init;

/// Modular addition network with the architecture switches
pub mod model;

/// Optimiser configuration and the L1 gradient transform
pub mod optim;

/// Training state, update step and the training loop
pub mod trainer;

/// Discrete Fourier basis and embedding frequency analysis
pub mod fourier;

#[cfg(not(feature = "wgpu"))]
pub type EvalBackend = burn::backend::NdArray;

#[cfg(feature = "wgpu")]
pub type EvalBackend = burn::backend::Wgpu;

pub type TrainBackend = burn::backend::Autodiff<EvalBackend>;
