// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a full training run in order:
//
//   Step 1: Load corpus lines            (Layer 4 - data)
//   Step 2: Corpus tokenizer if none set  (Layer 6 - infra)
//   Step 3: Build the task module         (Layer 5 - ml factory)
//   Step 4: Collate samples per task      (Layer 4 - data)
//   Step 5: Train / validation split      (Layer 4 - data)
//   Step 6: Save run config               (Layer 6 - infra)
//   Step 7: Fit loop                      (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use std::path::Path;

use anyhow::{Context, Result};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;

use crate::data::{
    collator::Collator,
    dataset::LmDataset,
    loader::TextLoader,
    preprocessor::Preprocessor,
    splitter::split_train_val,
};
use crate::domain::{model_args::ModelArguments, task::TaskKind, traits::TextSource};
use crate::error::TrainerError;
use crate::infra::{
    checkpoint::CheckpointManager,
    hub::HubResolver,
    metrics::EpochMetrics,
    tokenizer_store::{load_tokenizer, vocab_size, TokenizerStore},
};
use crate::ml::{
    factory::LanguageModule,
    trainer::{fit_module, FitConfig},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Everything a run needs. Saved as train_config.json next to the
// checkpoints so a run can be reproduced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub task:          TaskKind,
    pub train_file:    String,
    pub val_file:      Option<String>,
    pub model:         ModelArguments,
    pub output_dir:    String,
    pub max_seq_len:   usize,
    pub batch_size:    usize,
    pub epochs:        usize,
    /// Share of the training corpus held out when no val_file is given
    pub val_fraction:  f64,
    /// Upper bound for a tokenizer built from the corpus
    pub vocab_size:    usize,
    pub seed:          u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            task:         TaskKind::Mlm,
            train_file:   "data/train.txt".to_string(),
            val_file:     None,
            model:        ModelArguments::default(),
            output_dir:   "checkpoints".to_string(),
            max_seq_len:  128,
            batch_size:   8,
            epochs:       3,
            val_fraction: 0.1,
            vocab_size:   30522,
            seed:         42,
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline on `device`
    pub fn execute<B: AutodiffBackend>(&self, device: &B::Device) -> Result<Vec<EpochMetrics>> {
        let cfg = &self.config;

        // ── Step 1: Load corpus ───────────────────────────────────────────────
        let train_lines = TextLoader::new(&cfg.train_file)
            .load_all()
            .with_context(|| format!("Cannot load training corpus '{}'", cfg.train_file))?;
        let val_lines = cfg
            .val_file
            .as_ref()
            .map(|path| {
                TextLoader::new(path)
                    .load_all()
                    .with_context(|| format!("Cannot load validation corpus '{path}'"))
            })
            .transpose()?;

        // ── Step 2: Corpus tokenizer when none was given ──────────────────────
        let mut args = cfg.model.clone();
        if args.tokenizer.is_none() {
            let store = TokenizerStore::new(Path::new(&cfg.output_dir).join("tokenizer"));
            let preprocessor = Preprocessor::new();
            let texts: Vec<String> = train_lines.iter().map(|l| preprocessor.clean(l)).collect();
            store.load_or_build(&texts, cfg.vocab_size)?;
            args.tokenizer = Some(store.path().display().to_string());
        }

        // ── Step 3: Build the task module ─────────────────────────────────────
        let mut module = LanguageModule::<B>::build(cfg.task, args.clone(), device)
            .with_context(|| format!("Cannot build '{}' module", cfg.task))?;

        // ── Step 4: Collate samples ───────────────────────────────────────────
        let tokenizer = self.data_tokenizer(&module, &args)?;
        let entries   = vocab_size(&tokenizer);
        if entries > module.embedding_rows() {
            return Err(TrainerError::VocabularyMismatch {
                tokenizer:  entries,
                embeddings: module.embedding_rows(),
            }
            .into());
        }
        let max_seq_len = cfg.max_seq_len.min(module.architecture().max_position_embeddings);
        let mut collator = Collator::new(cfg.task, tokenizer, max_seq_len, cfg.seed)?;

        let train_samples = collator.collate(&train_lines)?;
        if train_samples.is_empty() {
            return Err(TrainerError::EmptyCorpus(cfg.train_file.clone()).into());
        }

        // ── Step 5: Validation set ────────────────────────────────────────────
        let (train_samples, val_samples) = match val_lines {
            Some(lines) => (train_samples, collator.collate(&lines)?),
            None => split_train_val(train_samples, 1.0 - cfg.val_fraction, cfg.seed),
        };
        tracing::info!("Split: {} train, {} validation", train_samples.len(), val_samples.len());

        // ── Step 6: Save config ───────────────────────────────────────────────
        CheckpointManager::new(&cfg.output_dir).save_config(cfg)?;

        // ── Step 7: Fit ───────────────────────────────────────────────────────
        let fit_cfg = FitConfig {
            epochs:     cfg.epochs,
            batch_size: cfg.batch_size,
            output_dir: cfg.output_dir.clone(),
            seed:       cfg.seed,
        };
        let history = fit_module(
            &mut module,
            LmDataset::new(train_samples),
            LmDataset::new(val_samples),
            &fit_cfg,
            device,
        )?;

        Ok(history)
    }

    /// The module's own tokenizer, or (for the plain LM, which keeps none)
    /// the one named in the arguments
    fn data_tokenizer<B: AutodiffBackend>(
        &self,
        module: &LanguageModule<B>,
        args:   &ModelArguments,
    ) -> Result<Tokenizer> {
        if let Some(tokenizer) = module.tokenizer() {
            return Ok(tokenizer.clone());
        }
        let identifier = args
            .tokenizer
            .as_deref()
            .ok_or_else(|| TrainerError::MissingTokenizer(self.config.task.to_string()))?;
        Ok(load_tokenizer(&HubResolver::new(args.cache_dir.clone()), identifier)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    use crate::domain::model_args::HyperParameter;
    use crate::infra::checkpoint::TRAIN_CONFIG_FILE;
    use crate::ml::config::{ArchitectureConfig, CONFIG_FILE};

    type TB = Autodiff<NdArray>;

    fn setup(dir: &Path, corpus: &str) -> TrainConfig {
        let arch = ArchitectureConfig {
            vocab_size:              16,
            hidden_size:             8,
            num_hidden_layers:       1,
            num_decoder_layers:      1,
            num_attention_heads:     2,
            intermediate_size:       16,
            max_position_embeddings: 8,
            hidden_dropout_prob:     0.0,
            ..Default::default()
        };
        arch.save(&dir.join(CONFIG_FILE)).unwrap();
        std::fs::write(dir.join("train.txt"), corpus).unwrap();

        TrainConfig {
            task:       TaskKind::Clm,
            train_file: dir.join("train.txt").display().to_string(),
            model: ModelArguments {
                model_config_name: Some(dir.display().to_string()),
                lr:                HyperParameter::Float(1e-3),
                ..Default::default()
            },
            output_dir:  dir.join("out").display().to_string(),
            max_seq_len: 32,
            batch_size:  2,
            epochs:      1,
            val_fraction: 0.25,
            ..Default::default()
        }
    }

    const CORPUS: &str = "the cat sat\nthe dog ran\na cat ran\nthe dog sat\n";

    #[test]
    fn test_end_to_end_with_corpus_tokenizer() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = setup(dir.path(), CORPUS);
        let out = std::path::PathBuf::from(&cfg.output_dir);

        let history = TrainUseCase::new(cfg).execute::<TB>(&Default::default()).unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].train_loss.is_finite());

        assert!(out.join("tokenizer").join("tokenizer.json").is_file());
        assert!(out.join(TRAIN_CONFIG_FILE).is_file());
        assert!(out.join("checkpoint-epoch-1").join("tokenizer.json").is_file());
    }

    #[test]
    fn test_cgm_with_separate_validation_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = setup(dir.path(), "the cat\tsat down\nthe dog\tran off\n");
        std::fs::write(dir.path().join("val.txt"), "a cat\tran down\n").unwrap();
        cfg.task     = TaskKind::Cgm;
        cfg.val_file = Some(dir.path().join("val.txt").display().to_string());

        let history = TrainUseCase::new(cfg).execute::<TB>(&Default::default()).unwrap();
        assert!(history[0].val_loss.is_finite());
    }

    #[test]
    fn test_invalid_learning_rate_stops_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = setup(dir.path(), CORPUS);
        cfg.model.lr = HyperParameter::Integer(1);

        let err = TrainUseCase::new(cfg).execute::<TB>(&Default::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrainerError>(),
            Some(TrainerError::InvalidHyperParameter { name: "lr", .. })
        ));
    }

    #[test]
    fn test_missing_training_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = setup(dir.path(), CORPUS);
        cfg.train_file = dir.path().join("absent.txt").display().to_string();
        assert!(TrainUseCase::new(cfg).execute::<TB>(&Default::default()).is_err());
    }

    #[test]
    fn test_lm_tokenizer_larger_than_embeddings_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = "one two three four five six seven eight\nnine ten eleven twelve thirteen fourteen\n";
        let mut cfg = setup(dir.path(), corpus);
        cfg.task = TaskKind::Lm;

        let err = TrainUseCase::new(cfg).execute::<TB>(&Default::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrainerError>(),
            Some(TrainerError::VocabularyMismatch { embeddings: 16, .. })
        ));
    }

    #[test]
    fn test_lm_within_vocabulary_reports_missing_loss_head() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = setup(dir.path(), CORPUS);
        cfg.task = TaskKind::Lm;

        let err = TrainUseCase::new(cfg).execute::<TB>(&Default::default()).unwrap_err();
        assert!(matches!(err.downcast_ref::<TrainerError>(), Some(TrainerError::NoLossHead("lm"))));
    }
}
