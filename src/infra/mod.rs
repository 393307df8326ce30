// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem once training is done:
//
//   checkpoint.rs — the run directory: hyper.json, metrics.json,
//                   train_batch.npy, one stacked .npy per
//                   parameter and the final burn model record
//
//   metrics.rs    — per-step metrics records and the JSON log
//
//   plots.rs      — training curves and weight heatmaps as SVG
//
// Training itself never writes to disk; it hands its results
// back to the application layer, which calls into here.

/// Run directory layout, parameter history and model persistence
pub mod checkpoint;

/// Metrics records and the metrics.json log
pub mod metrics;

/// Static SVG figures
pub mod plots;
