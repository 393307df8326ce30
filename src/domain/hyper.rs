// ============================================================
// Layer 3 — Hyperparameter Set
// ============================================================
// Every knob of a grokking run lives in one flat struct:
//   - task size           (n_tokens, percent_train)
//   - model shape         (embed_size, hidden_size)
//   - optimisation        (learning_rate, weight_decay, b1, b2)
//   - architecture switch (embed_config, is_collapsed_*, is_tied_hidden)
//
// The struct is immutable once a run starts. It is written to
// hyper.json next to the checkpoints so a run can be rebuilt
// later by `inspect`.
//
// Field names are the JSON keys, so keep them snake_case and
// stable: downstream notebooks read hyper.json directly.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// How the two input slots (and the output) share embedding matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedConfig {
    /// Separate `embed_a` / `embed_b` and a separate `unembed`
    Untied,
    /// One `embed` for both inputs, reused transposed as the unembedding
    Tied,
    /// One `embed` for both inputs, separate `unembed`
    InputTied,
}

/// Weight penalty applied by the optimiser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regularization {
    /// `weight_decay * sign(p)` added to every gradient, then Adam
    L1,
    /// Decoupled weight decay (AdamW)
    L2,
}

/// The full hyperparameter set for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyper {
    pub task:          String,
    pub sweep_slug:    String,

    pub n_tokens:      usize,
    pub percent_train: f64,

    pub embed_size:    usize,
    pub hidden_size:   usize,

    pub weight_decay:  f64,
    pub learning_rate: f64,

    pub max_steps:     usize,
    pub seed:          u64,

    /// Only keep pairs with a <= b
    pub is_symmetric_input:  bool,
    pub embed_config:        EmbedConfig,
    pub is_collapsed_out:    bool,
    pub is_collapsed_hidden: bool,
    pub is_tied_hidden:      bool,
    pub regularization:      Regularization,
    pub b1: f64,
    pub b2: f64,

    /// Sample a mini-batch of this size each step instead of the full train set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,

    pub log_every:  usize,
    pub save_every: usize,
}

impl Default for Hyper {
    // The configuration of the main model in the write-up.
    fn default() -> Self {
        Self {
            task:          "modular_addition".to_string(),
            sweep_slug:    "fail-memorize-generalize".to_string(),
            n_tokens:      67,
            percent_train: 0.4,
            embed_size:    500,
            hidden_size:   24,
            weight_decay:  1.0,
            learning_rate: 1e-3,
            max_steps:     50_000,
            seed:          165,

            is_symmetric_input:  true,
            embed_config:        EmbedConfig::Tied,
            is_collapsed_out:    false,
            is_collapsed_hidden: false,
            is_tied_hidden:      true,
            regularization:      Regularization::L2,
            b1: 0.9,
            b2: 0.98,

            batch_size: None,

            log_every:  100,
            save_every: 500,
        }
    }
}

impl Hyper {
    /// Derive the logging and checkpoint cadence from `max_steps`:
    /// 500 metric rows and 100 checkpoints per run, never less than every step.
    pub fn with_derived_cadence(mut self) -> Self {
        self.log_every  = (self.max_steps / 500).max(1);
        self.save_every = (self.max_steps / 100).max(1);
        self
    }

    /// Number of (a, b) pairs the task enumerates.
    pub fn n_pairs(&self) -> usize {
        let n = self.n_tokens;
        if self.is_symmetric_input { n * (n + 1) / 2 } else { n * n }
    }

    /// Load a hyperparameter file. Keys missing from the file keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read hyperparameters from '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid hyperparameter file '{}'", path.display()))
    }

    /// Reject settings that would make the run meaningless or panic mid-way.
    pub fn validate(&self) -> Result<()> {
        if self.n_tokens < 2 {
            bail!("n_tokens must be at least 2, got {}", self.n_tokens);
        }
        if !(self.percent_train > 0.0 && self.percent_train < 1.0) {
            bail!("percent_train must be in (0, 1), got {}", self.percent_train);
        }
        let n_train = (self.n_pairs() as f64 * self.percent_train).floor() as usize;
        if n_train == 0 {
            bail!(
                "percent_train {} leaves no training pairs out of {}",
                self.percent_train, self.n_pairs()
            );
        }
        if self.embed_size == 0 || self.hidden_size == 0 {
            bail!(
                "embed_size and hidden_size must be positive, got {} and {}",
                self.embed_size, self.hidden_size
            );
        }
        if self.learning_rate <= 0.0 {
            bail!("learning_rate must be positive, got {}", self.learning_rate);
        }
        if self.weight_decay < 0.0 {
            bail!("weight_decay must be non-negative, got {}", self.weight_decay);
        }
        for (name, beta) in [("b1", self.b1), ("b2", self.b2)] {
            if !(0.0..1.0).contains(&beta) {
                bail!("{name} must be in [0, 1), got {beta}");
            }
        }
        if self.batch_size == Some(0) {
            bail!("batch_size must be positive when set");
        }
        if self.log_every == 0 || self.save_every == 0 {
            bail!("log_every and save_every must be positive");
        }
        Ok(())
    }
}
