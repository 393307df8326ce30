// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Runs one grokking experiment end to end:
//
//   Step 1: Validate hyperparameters   (Layer 3 - domain)
//   Step 2: Generate and split pairs   (Layer 4 - data)
//   Step 3: Create the run directory   (Layer 6 - infra)
//   Step 4: Train                      (Layer 5 - ml)
//   Step 5: Persist metrics, data,
//           parameter history, model   (Layer 6 - infra)
//   Step 6: Plot                       (Layer 6 - infra)

use std::path::PathBuf;

use anyhow::Result;
use burn::module::AutodiffModule;

use crate::data::dataset::ModularDataset;
use crate::domain::hyper::Hyper;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::grokking_steps,
    plots::{plot_training, plot_weights},
};
use crate::ml::trainer::run_training;

/// Where a finished run landed and when it memorised / generalised.
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub run_dir:     PathBuf,
    pub memorised:   Option<usize>,
    pub generalised: Option<usize>,
}

pub struct TrainUseCase {
    hyper:   Hyper,
    workdir: PathBuf,
    plots:   bool,
}

impl TrainUseCase {
    pub fn new(hyper: Hyper, workdir: impl Into<PathBuf>, plots: bool) -> Self {
        Self { hyper, workdir: workdir.into(), plots }
    }

    pub fn execute(&self) -> Result<TrainReport> {
        let hyper = &self.hyper;

        // ── Step 1: Reject bad settings before any work ──────────────────────
        hyper.validate()?;

        // ── Step 2: All pairs, seeded train / eval split ─────────────────────
        let (train, eval) = ModularDataset::generate(hyper);
        tracing::info!(
            "Task '{}' mod {}: {} train pairs, {} eval pairs",
            hyper.task, hyper.n_tokens, train.len(), eval.len(),
        );

        // ── Step 3: Fresh run directory, hyper.json first ────────────────────
        let ckpt = CheckpointManager::create(&self.workdir, &hyper.sweep_slug)?;
        ckpt.save_hyper(hyper)?;

        // ── Step 4: Train ────────────────────────────────────────────────────
        let outcome = run_training(hyper, &train, &eval)?;
        let model   = outcome.model.valid();

        // ── Step 5: Persist ──────────────────────────────────────────────────
        ckpt.save_metrics(&outcome.metrics)?;
        ckpt.save_train_batch(&train)?;
        ckpt.save_checkpoints(&outcome.checkpoints)?;
        ckpt.save_model(&model)?;

        // ── Step 6: Figures ──────────────────────────────────────────────────
        if self.plots {
            plot_training(&outcome.metrics, &ckpt.dir().join("training.svg"))?;
            plot_weights(&model.snapshot()?, &ckpt.dir().join("weights.svg"))?;
            tracing::info!("Wrote training.svg and weights.svg");
        }

        let (memorised, generalised) = grokking_steps(&outcome.metrics);
        match (memorised, generalised) {
            (Some(m), Some(g)) => tracing::info!("Memorised at step {m}, generalised at step {g}"),
            (Some(m), None)    => tracing::info!("Memorised at step {m}, did not generalise"),
            _                  => tracing::info!("Did not fit the train set"),
        }

        Ok(TrainReport { run_dir: ckpt.dir().to_path_buf(), memorised, generalised })
    }
}
