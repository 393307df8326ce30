// ============================================================
// Layer 6 — Run Directory / Checkpoint Manager
// ============================================================
// Every run writes into a fresh timestamped directory:
//
//   <workdir>/sweeps/<sweep_slug>/<YYYY_MM_DD_HH_MM_SS>/
//     hyper.json             ← hyperparameters of the run
//     metrics.json           ← one record per logged step
//     train_batch.npy        ← int32 [n_train, 2] train inputs
//     <slug>.npy             ← f32 [n_checkpoints, rows, cols] per parameter
//     checkpoint_steps.json  ← step of each slice in the .npy stacks
//     model.mpk.gz           ← final weights (burn recorder, full precision)
//
// Parameter slugs are `<module>_<name>` with haiku-style
// top-level parameters prefixed by an underscore:
//   _embed, _embed_a, _embed_b, hidden_w, hidden_a_w, hidden_b_w,
//   out_w, unembed_w, _unembed
// The web viewer that reads these runs keys on those names.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, ensure, Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
};
use ndarray::{Array2, Array3};
use ndarray_npy::{read_npy, write_npy};

use crate::data::dataset::Batch;
use crate::domain::hyper::Hyper;
use crate::infra::metrics::{self, MetricsRecord};
use crate::ml::model::GrokModel;
use crate::ml::trainer::Checkpoint;

const HYPER_FILE: &str = "hyper.json";
const METRICS_FILE: &str = "metrics.json";
const TRAIN_BATCH_FILE: &str = "train_batch.npy";
const STEPS_FILE: &str = "checkpoint_steps.json";
const MODEL_FILE: &str = "model";

type ModelRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

/// Reads and writes the files of one run directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create `<workdir>/sweeps/<sweep_slug>/<timestamp>/`.
    /// Fails if that directory already exists.
    pub fn create(workdir: impl AsRef<Path>, sweep_slug: &str) -> Result<Self> {
        let stamp = chrono::Local::now().format("%Y_%m_%d_%H_%M_%S").to_string();
        let parent = workdir.as_ref().join("sweeps").join(sweep_slug);
        fs::create_dir_all(&parent)
            .with_context(|| format!("Cannot create sweep directory '{}'", parent.display()))?;

        let dir = parent.join(stamp);
        fs::create_dir(&dir)
            .with_context(|| format!("Cannot create run directory '{}'", dir.display()))?;

        tracing::info!("Run directory: '{}'", dir.display());
        Ok(Self { dir })
    }

    /// Open an existing run directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.join(HYPER_FILE).is_file() {
            bail!(
                "'{}' is not a run directory (no {}). Have you run 'train' first?",
                dir.display(), HYPER_FILE
            );
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save_hyper(&self, hyper: &Hyper) -> Result<()> {
        let path = self.dir.join(HYPER_FILE);
        let json = serde_json::to_string_pretty(hyper)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write hyperparameters to '{}'", path.display()))?;

        tracing::debug!("Saved hyperparameters to '{}'", path.display());
        Ok(())
    }

    pub fn load_hyper(&self) -> Result<Hyper> {
        Hyper::from_json_file(self.dir.join(HYPER_FILE))
    }

    pub fn save_metrics(&self, records: &[MetricsRecord]) -> Result<()> {
        metrics::save_metrics(&self.dir.join(METRICS_FILE), records)
    }

    pub fn load_metrics(&self) -> Result<Vec<MetricsRecord>> {
        metrics::load_metrics(&self.dir.join(METRICS_FILE))
    }

    /// Train inputs as int32 `[n_train, 2]`.
    pub fn save_train_batch(&self, batch: &Batch) -> Result<()> {
        let path   = self.dir.join(TRAIN_BATCH_FILE);
        let inputs = Array2::from_shape_vec((batch.len(), 2), batch.inputs_flat())?;
        write_npy(&path, &inputs)
            .with_context(|| format!("Cannot write train batch to '{}'", path.display()))?;
        Ok(())
    }

    pub fn load_train_batch(&self) -> Result<Array2<i32>> {
        let path = self.dir.join(TRAIN_BATCH_FILE);
        read_npy(&path).with_context(|| format!("Cannot read '{}'", path.display()))
    }

    /// One `<slug>.npy` per parameter, stacking every checkpoint along axis 0.
    pub fn save_checkpoints(&self, checkpoints: &[Checkpoint]) -> Result<()> {
        let Some(first) = checkpoints.first() else {
            tracing::warn!("No checkpoints to save");
            return Ok(());
        };

        for (idx, param) in first.params.iter().enumerate() {
            let [rows, cols] = param.shape;
            let mut stacked  = Vec::with_capacity(checkpoints.len() * rows * cols);
            for ckpt in checkpoints {
                let snap = &ckpt.params[idx];
                ensure!(
                    snap.slug == param.slug && snap.shape == param.shape,
                    "Checkpoint at step {} has a different parameter layout",
                    ckpt.step
                );
                stacked.extend_from_slice(&snap.values);
            }

            let array = Array3::from_shape_vec((checkpoints.len(), rows, cols), stacked)?;
            let path  = self.dir.join(format!("{}.npy", param.slug));
            write_npy(&path, &array)
                .with_context(|| format!("Cannot write '{}'", path.display()))?;
            tracing::debug!("Saved {:?} history to '{}'", array.shape(), path.display());
        }

        let steps: Vec<usize> = checkpoints.iter().map(|c| c.step).collect();
        let path = self.dir.join(STEPS_FILE);
        fs::write(&path, serde_json::to_string(&steps)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;

        tracing::info!(
            "Saved {} checkpoints of {} parameters",
            checkpoints.len(), first.params.len()
        );
        Ok(())
    }

    /// `[n_checkpoints, rows, cols]` history of one parameter.
    pub fn load_param_history(&self, slug: &str) -> Result<Array3<f32>> {
        let path = self.dir.join(format!("{slug}.npy"));
        read_npy(&path).with_context(|| format!("Cannot read '{}'", path.display()))
    }

    pub fn load_checkpoint_steps(&self) -> Result<Vec<usize>> {
        let path = self.dir.join(STEPS_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Final weights as gzipped MessagePack. Full precision so `inspect`
    /// evaluates exactly the trained parameters.
    pub fn save_model<B: Backend>(&self, model: &GrokModel<B>) -> Result<()> {
        // The recorder adds the extension
        let path = self.dir.join(MODEL_FILE);
        ModelRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save model to '{}'", path.display()))?;

        tracing::debug!("Saved final model to '{}'", path.display());
        Ok(())
    }

    /// Load the final weights into `model`, which must have the run's architecture.
    pub fn load_model<B: Backend>(
        &self,
        model:  GrokModel<B>,
        device: &B::Device,
    ) -> Result<GrokModel<B>> {
        let path   = self.dir.join(MODEL_FILE);
        let record = ModelRecorder::new()
            .load(path.clone(), device)
            .with_context(|| format!("Cannot load model '{}'", path.display()))?;
        Ok(model.load_record(record))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use rand::{rngs::StdRng, SeedableRng};

    use crate::data::dataset::ModularDataset;
    use crate::ml::model::{GrokModelConfig, ParamSnapshot};

    type TestBackend = NdArray;

    fn checkpoint(step: usize, offset: f32) -> Checkpoint {
        Checkpoint {
            step,
            params: vec![
                ParamSnapshot {
                    slug:   "_embed",
                    shape:  [3, 2],
                    values: (0..6).map(|i| i as f32 * 0.1 + offset).collect(),
                },
                ParamSnapshot {
                    slug:   "hidden_w",
                    shape:  [2, 1],
                    values: vec![-1.5 + offset, 1e-7],
                },
            ],
        }
    }

    #[test]
    fn test_run_directory_layout() {
        let work = tempfile::tempdir().unwrap();
        let mgr  = CheckpointManager::create(work.path(), "unit-test").unwrap();
        assert!(mgr.dir().starts_with(work.path().join("sweeps").join("unit-test")));
        assert!(mgr.dir().is_dir());
    }

    #[test]
    fn test_open_requires_hyper() {
        let work = tempfile::tempdir().unwrap();
        assert!(CheckpointManager::open(work.path()).is_err());
    }

    #[test]
    fn test_hyper_round_trip() {
        let work  = tempfile::tempdir().unwrap();
        let mgr   = CheckpointManager::create(work.path(), "s").unwrap();
        let hyper = Hyper { n_tokens: 13, batch_size: Some(16), ..Hyper::default() };
        mgr.save_hyper(&hyper).unwrap();

        let reopened = CheckpointManager::open(mgr.dir()).unwrap();
        assert_eq!(reopened.load_hyper().unwrap(), hyper);
    }

    #[test]
    fn test_checkpoint_arrays_round_trip_losslessly() {
        let work  = tempfile::tempdir().unwrap();
        let mgr   = CheckpointManager::create(work.path(), "s").unwrap();
        let ckpts = vec![checkpoint(0, 0.0), checkpoint(50, 0.25), checkpoint(100, -3.0)];
        mgr.save_checkpoints(&ckpts).unwrap();

        let embed = mgr.load_param_history("_embed").unwrap();
        assert_eq!(embed.shape(), &[3, 3, 2]);
        for (i, ckpt) in ckpts.iter().enumerate() {
            let saved: Vec<f32> = embed.index_axis(ndarray::Axis(0), i).iter().cloned().collect();
            assert_eq!(saved, ckpt.params[0].values);
        }

        let hidden = mgr.load_param_history("hidden_w").unwrap();
        assert_eq!(hidden[[2, 0, 0]], -4.5);
        assert_eq!(hidden[[1, 1, 0]], 1e-7);

        assert_eq!(mgr.load_checkpoint_steps().unwrap(), vec![0, 50, 100]);
    }

    #[test]
    fn test_mismatched_checkpoints_are_rejected() {
        let work = tempfile::tempdir().unwrap();
        let mgr  = CheckpointManager::create(work.path(), "s").unwrap();
        let mut bad = checkpoint(10, 0.0);
        bad.params.swap(0, 1);
        assert!(mgr.save_checkpoints(&[checkpoint(0, 0.0), bad]).is_err());
    }

    #[test]
    fn test_train_batch_npy() {
        let work  = tempfile::tempdir().unwrap();
        let mgr   = CheckpointManager::create(work.path(), "s").unwrap();
        let hyper = Hyper { n_tokens: 9, ..Hyper::default() };
        let (train, _) = ModularDataset::generate(&hyper);
        mgr.save_train_batch(&train).unwrap();

        let saved = mgr.load_train_batch().unwrap();
        assert_eq!(saved.dim(), (train.len(), 2));
        assert_eq!(saved[[0, 0]], train.inputs[0][0] as i32);
        assert_eq!(saved[[0, 1]], train.inputs[0][1] as i32);
    }

    #[test]
    fn test_model_record_round_trip() {
        let work   = tempfile::tempdir().unwrap();
        let mgr    = CheckpointManager::create(work.path(), "s").unwrap();
        let device = Default::default();
        let hyper  = Hyper { n_tokens: 5, embed_size: 4, hidden_size: 3, ..Hyper::default() };
        let config = GrokModelConfig::from(&hyper);

        let trained: GrokModel<TestBackend> = config.init(&mut StdRng::seed_from_u64(1), &device);
        mgr.save_model(&trained).unwrap();

        let blank: GrokModel<TestBackend> = config.init(&mut StdRng::seed_from_u64(2), &device);
        let loaded = mgr.load_model(blank, &device).unwrap();
        assert_eq!(loaded.snapshot().unwrap(), trained.snapshot().unwrap());
    }
}
