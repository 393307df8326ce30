// ============================================================
// Layer 2 — Inspect Use Case
// ============================================================
// Reopens a finished run and answers two questions:
//
//   1. How good is the final model?
//      hyper.json → architecture, model.mpk.gz → weights, and the
//      seeded split is regenerated so train / eval are the exact
//      pairs the run used.
//
//   2. What did it learn?
//      The token embedding is projected onto the Fourier basis;
//      a grokked model concentrates its norm on a few frequencies.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use burn::tensor::{backend::Backend, ElementConversion};
use ndarray::ArrayView2;

use crate::data::{batcher::TensorBatch, dataset::ModularDataset};
use crate::infra::{checkpoint::CheckpointManager, metrics::grokking_steps};
use crate::ml::{fourier::FourierBasis, trainer::eval_model, EvalBackend};

/// Final-model quality and embedding frequencies of a run.
#[derive(Debug, Clone)]
pub struct InspectReport {
    pub train_loss: f64,
    pub eval_loss:  f64,
    pub train_acc:  f64,
    pub eval_acc:   f64,

    /// Step at which train / eval accuracy first hit 1.0, from metrics.json
    pub memorised:   Option<usize>,
    pub generalised: Option<usize>,

    /// (frequency, norm), strongest first; frequency 0 is the constant term
    pub key_frequencies: Vec<(usize, f64)>,
}

pub struct InspectUseCase {
    ckpt: CheckpointManager,
}

impl InspectUseCase {
    pub fn new(run_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self { ckpt: CheckpointManager::open(run_dir)? })
    }

    pub fn execute(&self, top_k: usize) -> Result<InspectReport> {
        let hyper  = self.ckpt.load_hyper()?;
        let device = <EvalBackend as Backend>::Device::default();

        let model = self.ckpt.load_model(eval_model(&hyper, &device), &device)?;
        tracing::info!("Loaded model from '{}'", self.ckpt.dir().display());

        let (train, eval) = ModularDataset::generate(&hyper);
        let train = TensorBatch::<EvalBackend>::from_batch(&train, &device);
        let eval  = TensorBatch::<EvalBackend>::from_batch(&eval, &device);

        let train_loss = model.forward_loss(&train).into_scalar().elem::<f64>();
        let eval_loss  = model.forward_loss(&eval).into_scalar().elem::<f64>();
        let train_acc  = model.accuracy(&train);
        let eval_acc   = model.accuracy(&eval);

        // The first parameter is always the (first) token embedding, [n_tokens, embed_size]
        let snapshot = model.snapshot()?;
        let embed = snapshot
            .first()
            .ok_or_else(|| anyhow!("Model has no parameters"))?;
        let view = ArrayView2::from_shape((embed.shape[0], embed.shape[1]), embed.values.as_slice())?;

        let mut key_frequencies = FourierBasis::new(hyper.n_tokens).key_frequencies(view);
        key_frequencies.truncate(top_k);

        tracing::info!(
            "train_loss={:.6} eval_loss={:.6} train_acc={:.3} eval_acc={:.3}",
            train_loss, eval_loss, train_acc, eval_acc,
        );
        for (freq, norm) in &key_frequencies {
            tracing::info!("{} frequency {:>3}: norm {:.4}", embed.slug, freq, norm);
        }

        let (memorised, generalised) = match self.ckpt.load_metrics() {
            Ok(metrics) => grokking_steps(&metrics),
            Err(e) => {
                tracing::warn!("No metrics for this run: {e:#}");
                (None, None)
            }
        };

        Ok(InspectReport {
            train_loss,
            eval_loss,
            train_acc,
            eval_acc,
            memorised,
            generalised,
            key_frequencies,
        })
    }
}
