// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with clap.
// All work is delegated to Layer 2 (application).
//
//   train   : build a task module and fit it on a corpus
//   inspect : build a task module and print what it contains
//
// Training runs on Autodiff<Wgpu>; inspect needs no gradients
// and uses plain Wgpu.
//
// Reference: Rust Book §12 (CLI programs)

pub mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{Commands, InspectArgs, TrainArgs};

use crate::application::{
    inspect_use_case::InspectUseCase,
    train_use_case::{TrainConfig, TrainUseCase},
};
use crate::domain::model_args::ModelArguments;

type TrainBackend   = burn::backend::Autodiff<burn::backend::Wgpu>;
type InspectBackend = burn::backend::Wgpu;

#[derive(Parser, Debug)]
#[command(
    name = "lm-task-trainer",
    version,
    about = "Build and train task-conditioned language models (lm, mlm, clm, cgm, plm)."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route the subcommand to its use case; never computes anything itself.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Inspect(args) => run_inspect(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    let config = TrainConfig::try_from(args).context("Invalid training arguments")?;
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Training '{}' on '{}' using {:?}", config.task, config.train_file, device);

    let output_dir = config.output_dir.clone();
    let history = TrainUseCase::new(config).execute::<TrainBackend>(&device)?;

    let best = history
        .iter()
        .filter(|m| m.val_loss.is_finite())
        .min_by(|a, b| a.val_loss.total_cmp(&b.val_loss));
    match best {
        Some(m) => println!("Training complete. Best val_loss {:.4} at epoch {}.", m.val_loss, m.epoch),
        None => println!("Training complete."),
    }
    println!("Checkpoints written to '{output_dir}'.");
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    let task  = args.model.task;
    let model = ModelArguments::try_from(args.model).context("Invalid model arguments")?;
    let device = burn::backend::wgpu::WgpuDevice::default();

    let summary = InspectUseCase::new(task, model).execute::<InspectBackend>(&device)?;
    println!("{summary}");
    Ok(())
}
