// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Two subcommands: `train` and `inspect`.
//
// Hyperparameters resolve in three layers, later wins:
//   1. Hyper::default()        the configuration of the write-up
//   2. --hyper FILE            any subset of hyper.json keys
//   3. --<field> VALUE         individual flags
//
// log_every / save_every are then derived from the final
// max_steps unless given explicitly as flags.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::domain::hyper::{EmbedConfig, Hyper, Regularization};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a model on modular addition and save the run
    Train(TrainArgs),

    /// Evaluate a finished run and analyse its embedding
    Inspect(InspectArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// JSON file with hyperparameters; missing keys keep their defaults
    #[arg(long)]
    pub hyper: Option<PathBuf>,

    /// Runs are written to <workdir>/sweeps/<sweep_slug>/<timestamp>/
    #[arg(long, default_value = ".")]
    pub workdir: PathBuf,

    /// Skip training.svg and weights.svg
    #[arg(long)]
    pub no_plots: bool,

    #[arg(long)]
    pub sweep_slug: Option<String>,

    /// Modulus p; tokens are 0..p
    #[arg(long)]
    pub n_tokens: Option<usize>,

    /// Fraction of pairs used for training
    #[arg(long)]
    pub percent_train: Option<f64>,

    #[arg(long)]
    pub embed_size: Option<usize>,

    #[arg(long)]
    pub hidden_size: Option<usize>,

    #[arg(long)]
    pub weight_decay: Option<f64>,

    #[arg(long)]
    pub learning_rate: Option<f64>,

    #[arg(long)]
    pub max_steps: Option<usize>,

    #[arg(long)]
    pub seed: Option<u64>,

    /// Keep ordered pairs (a, b) and (b, a) both
    #[arg(long)]
    pub asymmetric_input: bool,

    #[arg(long, value_enum)]
    pub embed_config: Option<EmbedConfigArg>,

    #[arg(long)]
    pub collapsed_out: Option<bool>,

    #[arg(long)]
    pub collapsed_hidden: Option<bool>,

    #[arg(long)]
    pub tied_hidden: Option<bool>,

    #[arg(long, value_enum)]
    pub regularization: Option<RegularizationArg>,

    #[arg(long)]
    pub b1: Option<f64>,

    #[arg(long)]
    pub b2: Option<f64>,

    /// Sample a mini-batch of this size each step
    #[arg(long)]
    pub batch_size: Option<usize>,

    #[arg(long)]
    pub log_every: Option<usize>,

    #[arg(long)]
    pub save_every: Option<usize>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum EmbedConfigArg {
    Untied,
    Tied,
    InputTied,
}

impl From<EmbedConfigArg> for EmbedConfig {
    fn from(arg: EmbedConfigArg) -> Self {
        match arg {
            EmbedConfigArg::Untied    => EmbedConfig::Untied,
            EmbedConfigArg::Tied      => EmbedConfig::Tied,
            EmbedConfigArg::InputTied => EmbedConfig::InputTied,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum RegularizationArg {
    L1,
    L2,
}

impl From<RegularizationArg> for Regularization {
    fn from(arg: RegularizationArg) -> Self {
        match arg {
            RegularizationArg::L1 => Regularization::L1,
            RegularizationArg::L2 => Regularization::L2,
        }
    }
}

impl TrainArgs {
    /// Resolve defaults, the optional file and the flags into one `Hyper`.
    /// The application layer never sees clap types.
    pub fn to_hyper(&self) -> Result<Hyper> {
        let mut h = match &self.hyper {
            Some(path) => Hyper::from_json_file(path)?,
            None       => Hyper::default(),
        };

        macro_rules! set {
            ($($field:ident),* $(,)?) => {
                $( if let Some(v) = self.$field.clone() { h.$field = v.into(); } )*
            };
        }
        set!(sweep_slug, n_tokens, percent_train, embed_size, hidden_size, weight_decay,
             learning_rate, max_steps, seed, embed_config, regularization, b1, b2);

        if let Some(v) = self.collapsed_out    { h.is_collapsed_out    = v; }
        if let Some(v) = self.collapsed_hidden { h.is_collapsed_hidden = v; }
        if let Some(v) = self.tied_hidden      { h.is_tied_hidden      = v; }
        if self.asymmetric_input               { h.is_symmetric_input  = false; }
        if self.batch_size.is_some()           { h.batch_size          = self.batch_size; }

        let mut h = h.with_derived_cadence();
        if let Some(v) = self.log_every  { h.log_every  = v; }
        if let Some(v) = self.save_every { h.save_every = v; }
        Ok(h)
    }
}

/// All arguments for the `inspect` command
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// A run directory written by `train`
    #[arg(long)]
    pub run_dir: PathBuf,

    /// How many embedding frequencies to report
    #[arg(long, default_value_t = 5)]
    pub top: usize,
}
