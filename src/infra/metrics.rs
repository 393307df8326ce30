// ============================================================
// Layer 6 — Metrics Log
// ============================================================
// One record per logged step, collected in memory during
// training and written once as metrics.json:
//
//   [
//     {"step": 0, "train_loss": 0.0637, "eval_loss": 0.0629,
//      "train_acc": 0.012, "eval_acc": 0.015,
//      "l1_norm": 5821.3, "l2_norm": 73.9, "steps_per_sec": 412.0},
//     ...
//   ]
//
// How to read the metrics:
//   - train_acc reaching 1.0 long before eval_acc → memorisation
//   - eval_acc jumping to 1.0 later → the model grokked
//   - l2_norm shrinking under weight decay usually precedes the jump

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One row of metrics for a logged training step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub step: usize,

    /// Loss of the parameters the step started from
    pub train_loss: f64,

    /// Loss on the held-out pairs after the step
    pub eval_loss: f64,

    /// Fraction of train pairs answered correctly after the step
    pub train_acc: f64,

    /// Fraction of held-out pairs answered correctly after the step
    pub eval_acc: f64,

    pub l1_norm: f64,
    pub l2_norm: f64,

    pub steps_per_sec: f64,
}

impl MetricsRecord {
    /// True once the model answers every train pair correctly.
    pub fn has_memorised(&self) -> bool {
        self.train_acc >= 1.0
    }

    /// True once the model answers every held-out pair correctly.
    pub fn has_generalised(&self) -> bool {
        self.eval_acc >= 1.0
    }
}

/// First steps at which the train and eval sets were fully solved.
pub fn grokking_steps(metrics: &[MetricsRecord]) -> (Option<usize>, Option<usize>) {
    let memorised   = metrics.iter().find(|m| m.has_memorised()).map(|m| m.step);
    let generalised = metrics.iter().find(|m| m.has_generalised()).map(|m| m.step);
    (memorised, generalised)
}

/// Write all records as a JSON array.
pub fn save_metrics(path: &Path, metrics: &[MetricsRecord]) -> Result<()> {
    let json = serde_json::to_string(metrics)?;
    fs::write(path, json)
        .with_context(|| format!("Cannot write metrics to '{}'", path.display()))?;

    tracing::debug!("Wrote {} metric rows to '{}'", metrics.len(), path.display());
    Ok(())
}

/// Read a metrics.json written by [`save_metrics`].
pub fn load_metrics(path: &Path) -> Result<Vec<MetricsRecord>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read metrics from '{}'", path.display()))?;
    Ok(serde_json::from_str(&json)?)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn record(step: usize, train_acc: f64, eval_acc: f64) -> MetricsRecord {
        MetricsRecord {
            step,
            train_loss: 0.05,
            eval_loss: 0.06,
            train_acc,
            eval_acc,
            l1_norm: 10.0,
            l2_norm: 1.0,
            steps_per_sec: 100.0,
        }
    }

    #[test]
    fn test_grokking_steps() {
        let metrics = vec![
            record(0,   0.1, 0.0),
            record(100, 1.0, 0.2),
            record(200, 1.0, 1.0),
        ];
        assert_eq!(grokking_steps(&metrics), (Some(100), Some(200)));
        assert_eq!(grokking_steps(&metrics[..2]), (Some(100), None));
    }

    #[test]
    fn test_save_and_load() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let metrics = vec![record(0, 0.0, 0.0), record(10, 0.5, 0.25)];

        save_metrics(&path, &metrics).unwrap();
        assert_eq!(load_metrics(&path).unwrap(), metrics);

        // Keys are the flat names notebooks read
        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[1]["eval_acc"], 0.25);
        assert_eq!(raw[1]["step"], 10);
    }
}
