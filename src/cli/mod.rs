// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// The entry point for all user interaction, parsed with clap.
// All work is delegated to Layer 2 (application).
//
//   grokking train   [--hyper FILE] [--workdir DIR] [--<field> V]...
//   grokking inspect --run-dir DIR [--top K]

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, InspectArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "grokking",
    version,
    about = "Train small networks on modular addition and watch them grok."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case. Routing only.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Inspect(args) => run_inspect(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let hyper = args.to_hyper()?;
    tracing::info!(
        "Starting run '{}': p={}, {} steps, {:?} embeddings, {:?} regularisation",
        hyper.sweep_slug, hyper.n_tokens, hyper.max_steps, hyper.embed_config, hyper.regularization,
    );

    let report = TrainUseCase::new(hyper, args.workdir, !args.no_plots).execute()?;

    println!("\nRun saved to {}", report.run_dir.display());
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    use crate::application::inspect_use_case::InspectUseCase;

    let report = InspectUseCase::new(args.run_dir)?.execute(args.top)?;

    println!("\ntrain loss {:.6}  acc {:.3}", report.train_loss, report.train_acc);
    println!("eval  loss {:.6}  acc {:.3}", report.eval_loss, report.eval_acc);
    let fmt_step = |s: Option<usize>| s.map_or("never".to_string(), |s| s.to_string());
    println!("memorised at {}, generalised at {}", fmt_step(report.memorised), fmt_step(report.generalised));
    println!("key frequencies:");
    for (freq, norm) in &report.key_frequencies {
        println!("  {freq:>3}  {norm:.4}");
    }
    Ok(())
}
