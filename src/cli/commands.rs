// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Two subcommands, `train` and `inspect`, sharing one group of
// model flags. --model-args loads a ModelArguments JSON file
// first; any model flag given on the command line overrides the
// matching field from that file.
//
// --lr and --lr-decay are parsed as HyperParameter so "1" and
// "1.0" stay distinguishable all the way to the optimizer check.
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;
use crate::domain::{
    model_args::{HyperParameter, ModelArguments},
    task::TaskKind,
};
use crate::error::TrainerError;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a task-conditioned language model on a text corpus
    Train(TrainArgs),

    /// Build a task module and print a summary of it
    Inspect(InspectArgs),
}

/// Flags that become ModelArguments
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// One of: lm, mlm, clm, cgm, plm
    #[arg(long)]
    pub task: TaskKind,

    /// ModelArguments JSON file used as the base for the flags below
    #[arg(long)]
    pub model_args: Option<PathBuf>,

    /// Hub repo id or local directory holding config.json + model.mpk
    #[arg(long)]
    pub model_name_or_path: Option<String>,

    /// Hub repo id or local directory holding config.json (train from scratch)
    #[arg(long)]
    pub model_config_name: Option<String>,

    /// Hub repo id, local directory or tokenizer.json path
    #[arg(long)]
    pub tokenizer: Option<String>,

    /// Download cache for hub artifacts
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Learning rate; must be written as a real number (2e-5, 1.0) in (0, 1]
    #[arg(long)]
    pub lr: Option<HyperParameter>,

    #[arg(long)]
    pub weight_decay: Option<f64>,

    /// Per-epoch learning-rate multiplier; must be a real number in (0, 1]
    #[arg(long)]
    pub lr_decay: Option<HyperParameter>,
}

impl TryFrom<ModelArgs> for ModelArguments {
    type Error = TrainerError;

    fn try_from(a: ModelArgs) -> Result<Self, Self::Error> {
        let mut args = match &a.model_args {
            Some(path) => ModelArguments::from_json_file(path)?,
            None => ModelArguments::default(),
        };

        if a.model_name_or_path.is_some() {
            args.model_name_or_path = a.model_name_or_path;
        }
        if a.model_config_name.is_some() {
            args.model_config_name = a.model_config_name;
        }
        if a.tokenizer.is_some() {
            args.tokenizer = a.tokenizer;
        }
        if a.cache_dir.is_some() {
            args.cache_dir = a.cache_dir;
        }
        if let Some(lr) = a.lr {
            args.lr = lr;
        }
        if let Some(weight_decay) = a.weight_decay {
            args.weight_decay = weight_decay;
        }
        if let Some(lr_decay) = a.lr_decay {
            args.lr_decay = lr_decay;
        }
        Ok(args)
    }
}

/// All arguments for the `train` command
#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// UTF-8 corpus, one example per line (cgm: source<TAB>target)
    #[arg(long)]
    pub train_file: String,

    /// Validation corpus; without it a share of the training corpus is held out
    #[arg(long)]
    pub val_file: Option<String>,

    /// Share held out for validation when --val-file is absent
    #[arg(long, default_value_t = 0.1)]
    pub val_fraction: f64,

    /// Directory for checkpoints, metrics.csv and train_config.json
    #[arg(long, default_value = "checkpoints")]
    pub output_dir: String,

    /// Tokens per sample; capped by the model's max_position_embeddings
    #[arg(long, default_value_t = 128)]
    pub max_seq_len: usize,

    #[arg(long, default_value_t = 8)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 3)]
    pub epochs: usize,

    /// Vocabulary cap for a tokenizer built from the corpus (no --tokenizer)
    #[arg(long, default_value_t = 30522)]
    pub vocab_size: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl TryFrom<TrainArgs> for TrainConfig {
    type Error = TrainerError;

    fn try_from(a: TrainArgs) -> Result<Self, Self::Error> {
        Ok(TrainConfig {
            task:         a.model.task,
            model:        a.model.try_into()?,
            train_file:   a.train_file,
            val_file:     a.val_file,
            output_dir:   a.output_dir,
            max_seq_len:  a.max_seq_len,
            batch_size:   a.batch_size,
            epochs:       a.epochs,
            val_fraction: a.val_fraction,
            vocab_size:   a.vocab_size,
            seed:         a.seed,
        })
    }
}

/// All arguments for the `inspect` command
#[derive(Args, Debug)]
pub struct InspectArgs {
    #[command(flatten)]
    pub model: ModelArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn parse(argv: &[&str]) -> Commands {
        Cli::try_parse_from(argv).unwrap().command
    }

    #[test]
    fn test_train_flags_become_config() {
        let Commands::Train(args) = parse(&[
            "lm-task-trainer", "train", "--task", "CLM", "--train-file", "corpus.txt",
            "--model-config-name", "cfg", "--tokenizer", "tok", "--lr", "3e-4", "--epochs", "2",
        ]) else {
            panic!("expected train");
        };
        let cfg = TrainConfig::try_from(args).unwrap();
        assert_eq!(cfg.task, TaskKind::Clm);
        assert_eq!(cfg.epochs, 2);
        assert_eq!(cfg.model.lr, HyperParameter::Float(3e-4));
        assert_eq!(cfg.model.lr_decay, HyperParameter::Float(0.5));
        assert_eq!(cfg.model.tokenizer.as_deref(), Some("tok"));
    }

    #[test]
    fn test_integer_lr_flag_is_kept_as_integer() {
        let Commands::Inspect(args) = parse(&["lm-task-trainer", "inspect", "--task", "mlm", "--lr", "1"]) else {
            panic!("expected inspect");
        };
        let model = ModelArguments::try_from(args.model).unwrap();
        assert_eq!(model.lr, HyperParameter::Integer(1));
    }

    #[test]
    fn test_unknown_task_is_rejected() {
        assert!(Cli::try_parse_from(["lm-task-trainer", "inspect", "--task", "gpt"]).is_err());
    }

    #[test]
    fn test_flags_override_model_args_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("args.json");
        std::fs::write(&path, r#"{"model_config_name": "from-file", "lr": 0.1, "weight_decay": 0.01}"#).unwrap();

        let Commands::Inspect(args) = parse(&[
            "lm-task-trainer", "inspect", "--task", "lm",
            "--model-args", path.to_str().unwrap(), "--lr", "0.2",
        ]) else {
            panic!("expected inspect");
        };
        let model = ModelArguments::try_from(args.model).unwrap();
        assert_eq!(model.model_config_name.as_deref(), Some("from-file"));
        assert_eq!(model.lr, HyperParameter::Float(0.2));
        assert_eq!(model.weight_decay, 0.01);
    }
}
