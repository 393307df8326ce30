// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Full-batch gradient descent on the fixed train set, with
// periodic evaluation and parameter snapshots.
//
// The training state is threaded through the loop by value:
//
//   state₀ = init(seed)
//   (stateₖ₊₁, metrics) = stateₖ.update(batch)
//
// After the update at loop index `step`:
//   step % save_every == 0 → snapshot the updated parameters
//   step % log_every  == 0 → evaluate the updated parameters
//
// Backend split:
//   - Training uses TrainBackend (Autodiff<_>) for gradients
//   - model.valid() returns the model on the inner backend,
//     so evaluation builds no autodiff graph
//   - Eval batches must also live on the inner backend

use std::time::Instant;

use anyhow::Result;
use burn::{
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::data::{batcher::TensorBatch, dataset::Batch};
use crate::domain::hyper::{Hyper, Regularization};
use crate::infra::metrics::MetricsRecord;
use crate::ml::model::{GrokModel, GrokModelConfig, ParamSnapshot};
use crate::ml::optim::{adam_config, adamw_config, apply_l1};
use crate::ml::{EvalBackend, TrainBackend};

/// The per-step settings `update` needs from the hyperparameters.
#[derive(Debug, Clone, Copy)]
pub struct StepSettings {
    pub learning_rate:  f64,
    pub weight_decay:   f64,
    pub regularization: Regularization,
    pub batch_size:     Option<usize>,
}

impl From<&Hyper> for StepSettings {
    fn from(h: &Hyper) -> Self {
        Self {
            learning_rate:  h.learning_rate,
            weight_decay:   h.weight_decay,
            regularization: h.regularization,
            batch_size:     h.batch_size,
        }
    }
}

/// Parameters, optimiser state, RNG and step counter of a run.
pub struct TrainingState<B: AutodiffBackend, O> {
    pub model:    GrokModel<B>,
    pub optim:    O,
    pub rng:      StdRng,
    pub step:     usize,
    pub settings: StepSettings,
}

/// What a single `update` reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepMetrics {
    /// Step counter before the update
    pub step:       usize,
    /// Loss of the parameters before the update
    pub train_loss: f64,
}

/// Parameters captured at a checkpoint step.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub step:   usize,
    pub params: Vec<ParamSnapshot>,
}

/// Everything a finished run hands to the persistence layer.
pub struct TrainOutcome<B: Backend> {
    pub model:       GrokModel<B>,
    pub metrics:     Vec<MetricsRecord>,
    pub checkpoints: Vec<Checkpoint>,
}

impl<B, O> TrainingState<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<GrokModel<B>, B>,
{
    /// Deterministic initial state: the seed is split into an init stream
    /// for the weights and a carried stream for mini-batch sampling.
    pub fn init(hyper: &Hyper, optim: O, device: &B::Device) -> Self {
        let mut rng      = StdRng::seed_from_u64(hyper.seed);
        let mut init_rng = StdRng::seed_from_u64(rng.gen());
        let model = GrokModelConfig::from(hyper).init(&mut init_rng, device);

        Self { model, optim, rng, step: 0, settings: StepSettings::from(hyper) }
    }

    /// One gradient step. Consumes the state and returns its successor.
    pub fn update(mut self, batch: &TensorBatch<B>) -> (Self, StepMetrics) {
        let batch = match self.settings.batch_size {
            Some(size) => batch.sample(size, &mut self.rng),
            None       => batch.clone(),
        };

        let loss       = self.model.forward_loss(&batch);
        let train_loss = loss.clone().into_scalar().elem::<f64>();

        let grads = GradientsParams::from_grads(loss.backward(), &self.model);
        let grads = match self.settings.regularization {
            Regularization::L1 => apply_l1(&self.model, grads, self.settings.weight_decay),
            Regularization::L2 => grads,
        };

        let model   = self.optim.step(self.settings.learning_rate, self.model, grads);
        let metrics = StepMetrics { step: self.step, train_loss };

        let next = Self {
            model,
            optim:    self.optim,
            rng:      self.rng,
            step:     self.step + 1,
            settings: self.settings,
        };
        (next, metrics)
    }
}

/// Train with the optimiser the run's regularisation calls for.
pub fn run_training(hyper: &Hyper, train: &Batch, eval: &Batch) -> Result<TrainOutcome<TrainBackend>> {
    let device = <TrainBackend as Backend>::Device::default();
    tracing::info!("Using device: {:?}", device);

    match hyper.regularization {
        Regularization::L2 => {
            let optim = adamw_config(hyper).init::<TrainBackend, GrokModel<TrainBackend>>();
            train_loop(hyper, TrainingState::init(hyper, optim, &device), train, eval, &device)
        }
        Regularization::L1 => {
            let optim = adam_config(hyper).init::<TrainBackend, GrokModel<TrainBackend>>();
            train_loop(hyper, TrainingState::init(hyper, optim, &device), train, eval, &device)
        }
    }
}

/// Run `update` for steps 0..=max_steps, logging and snapshotting on cadence.
pub fn train_loop<B, O>(
    hyper:     &Hyper,
    mut state: TrainingState<B, O>,
    train:     &Batch,
    eval:      &Batch,
    device:    &B::Device,
) -> Result<TrainOutcome<B>>
where
    B: AutodiffBackend,
    O: Optimizer<GrokModel<B>, B>,
{
    let train_batch = TensorBatch::<B>::from_batch(train, device);

    // Evaluation batches live on the inner backend, no autodiff overhead
    let train_eval = TensorBatch::<B::InnerBackend>::from_batch(train, device);
    let eval_eval  = TensorBatch::<B::InnerBackend>::from_batch(eval, device);

    tracing::info!(
        "Training {} steps on {} examples ({} held out), log every {}, save every {}",
        hyper.max_steps, train.len(), eval.len(), hyper.log_every, hyper.save_every,
    );

    let mut metrics:     Vec<MetricsRecord> = Vec::new();
    let mut checkpoints: Vec<Checkpoint>    = Vec::new();
    let mut prev_time = Instant::now();

    for step in 0..=hyper.max_steps {
        let (next, step_metrics) = state.update(&train_batch);
        state = next;

        if step % hyper.save_every == 0 {
            checkpoints.push(Checkpoint { step, params: state.model.valid().snapshot()? });
        }

        if step % hyper.log_every == 0 {
            let elapsed       = prev_time.elapsed().as_secs_f64();
            let steps_per_sec = hyper.log_every as f64 / elapsed.max(f64::EPSILON);
            prev_time = Instant::now();

            let record = evaluate(&state.model.valid(), step_metrics, &train_eval, &eval_eval, steps_per_sec);
            println!(
                "step {:>6}/{} | train_loss={:.6} | eval_loss={:.6} | train_acc={:.3} | eval_acc={:.3} | l2={:.2} | {:.0} steps/s",
                record.step, hyper.max_steps, record.train_loss, record.eval_loss,
                record.train_acc, record.eval_acc, record.l2_norm, record.steps_per_sec,
            );
            metrics.push(record);
        }
    }

    tracing::info!(
        "Training complete: {} metric rows, {} checkpoints",
        metrics.len(), checkpoints.len(),
    );

    Ok(TrainOutcome { model: state.model, metrics, checkpoints })
}

/// Metrics row for the parameters after a logged step.
pub fn evaluate<B: Backend>(
    model:         &GrokModel<B>,
    step_metrics:  StepMetrics,
    train:         &TensorBatch<B>,
    eval:          &TensorBatch<B>,
    steps_per_sec: f64,
) -> MetricsRecord {
    let (l1_norm, l2_norm) = model.norms();
    MetricsRecord {
        step:       step_metrics.step,
        train_loss: step_metrics.train_loss,
        eval_loss:  model.forward_loss(eval).into_scalar().elem::<f64>(),
        train_acc:  model.accuracy(train),
        eval_acc:   model.accuracy(eval),
        l1_norm,
        l2_norm,
        steps_per_sec,
    }
}

/// Fresh model on the evaluation backend with the architecture of `hyper`.
pub fn eval_model(hyper: &Hyper, device: &<EvalBackend as Backend>::Device) -> GrokModel<EvalBackend> {
    let mut rng = StdRng::seed_from_u64(hyper.seed);
    GrokModelConfig::from(hyper).init(&mut rng, device)
}
