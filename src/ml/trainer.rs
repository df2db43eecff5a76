// ============================================================
// Layer 5 — Fit Loop
// ============================================================
// Drives a TaskModule through its hooks, one epoch at a time:
//
//   setup = configure_optimizers()          (AdamW + decay schedule)
//   for epoch in 1..=epochs:
//       lr = setup.lr_scheduler.step()      (decays once per epoch)
//       for batch in train_loader:          (reshuffled every epoch)
//           loss = training_step(batch)
//           backward + AdamW update at lr
//       for batch in val_loader:
//           validation_step(batch)          (model.valid(), no dropout)
//       log mean train_loss / val_loss, save checkpoint-epoch-N
//       val_loss improved → also save "best"
//
// Key Burn 0.20 insight:
//   - Training batches live on B (Autodiff) for gradients
//   - Validation batches live on B::InnerBackend, the backend
//     model.valid() runs on
//
// Samples are expected to be padded to a common length already.
//
// Reference: Burn Book §5 (Custom Training Loop)

use burn::{
    data::{dataloader::DataLoaderBuilder, dataset::Dataset},
    lr_scheduler::LrScheduler,
    module::AutodiffModule,
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::data::{
    batcher::{LmBatch, LmBatcher},
    dataset::{LmDataset, LmSample},
};
use crate::error::Result;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger, TRAIN_LOSS, VAL_LOSS},
};
use crate::ml::factory::{with_module, LanguageModule};
use crate::ml::module::TaskModule;
use crate::ml::networks::LanguageNetwork;

/// Loop settings that are not part of the module itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitConfig {
    pub epochs:     usize,
    pub batch_size: usize,
    pub output_dir: String,
    /// Seeds the per-epoch shuffle of the training set
    pub seed:       u64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            epochs:     3,
            batch_size: 8,
            output_dir: "checkpoints".to_string(),
            seed:       42,
        }
    }
}

/// Fit whichever network the factory produced
pub fn fit_module<B: AutodiffBackend>(
    module: &mut LanguageModule<B>,
    train:  LmDataset,
    val:    LmDataset,
    cfg:    &FitConfig,
    device: &B::Device,
) -> Result<Vec<EpochMetrics>> {
    with_module!(module, m => fit(m, train, val, cfg, device))
}

pub fn fit<B, N>(
    module: &mut TaskModule<B, N>,
    train:  LmDataset,
    val:    LmDataset,
    cfg:    &FitConfig,
    device: &B::Device,
) -> Result<Vec<EpochMetrics>>
where
    B: AutodiffBackend,
    N: LanguageNetwork<B> + AutodiffModule<B>,
    N::InnerModule: LanguageNetwork<B::InnerBackend>,
{
    let setup = module.configure_optimizers()?;
    let mut optimizer    = setup.optimizer;
    let mut lr_scheduler = setup.lr_scheduler;

    let checkpoints = CheckpointManager::new(&cfg.output_dir);
    let metrics     = MetricsLogger::new(&cfg.output_dir)?;
    let batch_size  = cfg.batch_size.max(1);

    tracing::info!(
        "Fitting '{}' module ({} params): {} train / {} val samples, {} epochs, monitor={}",
        module.task(),
        module.model.num_params(),
        train.len(),
        val.len(),
        cfg.epochs,
        setup.monitor,
    );

    // ── Training data loader (AutodiffBackend) ────────────────────────────────
    let train_loader = DataLoaderBuilder::<B, LmSample, LmBatch<B>>::new(LmBatcher::new())
        .batch_size(batch_size)
        .shuffle(cfg.seed)
        .set_device(device.clone())
        .build(train);

    // ── Validation data loader (InnerBackend, no autodiff overhead) ───────────
    let val_loader =
        DataLoaderBuilder::<B::InnerBackend, LmSample, LmBatch<B::InnerBackend>>::new(LmBatcher::new())
            .batch_size(batch_size)
            .set_device(device.clone())
            .build(val);

    let mut history  = Vec::with_capacity(cfg.epochs);
    let mut best_val = f64::INFINITY;

    for epoch in 1..=cfg.epochs {
        let lr = lr_scheduler.step();

        // ── Training phase ────────────────────────────────────────────────────
        for (batch_idx, batch) in train_loader.iter().enumerate() {
            let loss = module.training_step(batch, batch_idx)?;
            module.apply_gradients(&mut optimizer, lr, loss);
        }

        // ── Validation phase ──────────────────────────────────────────────────
        for (batch_idx, batch) in val_loader.iter().enumerate() {
            module.validation_step(batch, batch_idx)?;
        }

        let means      = module.step_log_mut().drain_means();
        let train_loss = means.get(TRAIN_LOSS).copied().unwrap_or(f64::NAN);
        let val_loss   = means.get(VAL_LOSS).copied().unwrap_or(f64::NAN);
        let row        = EpochMetrics::new(epoch, lr, train_loss, val_loss);

        tracing::info!(
            "Epoch {:>3}/{} | lr={:.2e} | train_loss={:.4} | val_loss={:.4}",
            epoch, cfg.epochs, lr, train_loss, val_loss,
        );
        metrics.log(&row)?;

        checkpoints.save_pretrained(&format!("checkpoint-epoch-{epoch}"), module)?;
        if row.is_improvement(best_val) {
            best_val = val_loss;
            checkpoints.save_pretrained("best", module)?;
            tracing::info!("New best {} = {:.4}", VAL_LOSS, val_loss);
        }

        history.push(row);
    }

    tracing::info!("Training complete!");
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    use crate::data::collator::Collator;
    use crate::domain::{model_args::{HyperParameter, ModelArguments}, task::TaskKind};
    use crate::error::TrainerError;
    use crate::infra::{checkpoint::WEIGHTS_FILE, tokenizer_store::TokenizerStore};
    use crate::ml::config::{ArchitectureConfig, CONFIG_FILE};

    type TB = Autodiff<NdArray>;

    fn tiny_module(dir: &std::path::Path, task: TaskKind, lr_decay: f64) -> LanguageModule<TB> {
        let config = ArchitectureConfig {
            vocab_size:              12,
            hidden_size:             8,
            num_hidden_layers:       1,
            num_decoder_layers:      1,
            num_attention_heads:     2,
            intermediate_size:       16,
            max_position_embeddings: 8,
            hidden_dropout_prob:     0.0,
            ..Default::default()
        };
        config.save(&dir.join(CONFIG_FILE)).unwrap();

        let corpus = vec!["a b c d e f g".to_string()];
        let store = TokenizerStore::new(dir.join("tok"));
        store.load_or_build(&corpus, 64).unwrap();

        let args = ModelArguments {
            model_config_name: Some(dir.display().to_string()),
            tokenizer:         Some(store.path().display().to_string()),
            lr:                HyperParameter::Float(1e-2),
            lr_decay:          HyperParameter::Float(lr_decay),
            ..Default::default()
        };
        LanguageModule::build(task, args, &Default::default()).unwrap()
    }

    fn samples(n: usize) -> LmDataset {
        LmDataset::new(
            (0..n)
                .map(|i| {
                    let a = 3 + (i % 5) as u32;
                    LmSample {
                        input_ids:      vec![a, a + 1, a + 2, 0],
                        attention_mask: vec![1, 1, 1, 0],
                        labels:         vec![a as i64, a as i64 + 1, a as i64 + 2, -100],
                        perm_mask:      None,
                    }
                })
                .collect(),
        )
    }

    fn fit_cfg(dir: &std::path::Path, epochs: usize) -> FitConfig {
        FitConfig {
            epochs,
            batch_size: 2,
            output_dir: dir.join("out").display().to_string(),
            seed:       7,
        }
    }

    #[test]
    fn test_lr_decays_once_per_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let mut module = tiny_module(dir.path(), TaskKind::Clm, 0.5);
        let history = fit_module(&mut module, samples(5), samples(2), &fit_cfg(dir.path(), 3), &Default::default())
            .unwrap();

        let lrs: Vec<f64> = history.iter().map(|m| m.lr).collect();
        assert_eq!(history.len(), 3);
        assert!((lrs[0] - 1e-2).abs() < 1e-12);
        assert!((lrs[1] - 5e-3).abs() < 1e-12);
        assert!((lrs[2] - 2.5e-3).abs() < 1e-12);
        assert!(history.iter().all(|m| m.train_loss.is_finite() && m.val_loss.is_finite()));
    }

    #[test]
    fn test_checkpoints_and_metrics_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut module = tiny_module(dir.path(), TaskKind::Mlm, 0.5);
        let cfg = fit_cfg(dir.path(), 2);
        fit_module(&mut module, samples(4), samples(2), &cfg, &Default::default()).unwrap();

        let out = std::path::Path::new(&cfg.output_dir);
        for name in ["checkpoint-epoch-1", "checkpoint-epoch-2", "best"] {
            assert!(out.join(name).join(CONFIG_FILE).is_file(), "{name}");
            assert!(out.join(name).join(WEIGHTS_FILE).is_file(), "{name}");
        }
        let csv = std::fs::read_to_string(out.join("metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn test_training_lowers_loss_on_repeated_data() {
        let dir = tempfile::tempdir().unwrap();
        let mut module = tiny_module(dir.path(), TaskKind::Mlm, 1.0);
        let history = fit_module(&mut module, samples(4), samples(4), &fit_cfg(dir.path(), 10), &Default::default())
            .unwrap();
        assert!(history.last().unwrap().val_loss < history[0].val_loss);
    }

    #[test]
    fn test_missing_validation_data_leaves_val_loss_nan() {
        let dir = tempfile::tempdir().unwrap();
        let mut module = tiny_module(dir.path(), TaskKind::Clm, 0.5);
        let cfg = fit_cfg(dir.path(), 1);
        let history = fit_module(&mut module, samples(3), LmDataset::new(Vec::new()), &cfg, &Default::default())
            .unwrap();
        assert!(history[0].val_loss.is_nan());
        assert!(!std::path::Path::new(&cfg.output_dir).join("best").exists());
    }

    #[test]
    fn test_plain_lm_cannot_be_fitted() {
        let dir = tempfile::tempdir().unwrap();
        let mut module = tiny_module(dir.path(), TaskKind::Lm, 0.5);
        let err = fit_module(&mut module, samples(2), samples(1), &fit_cfg(dir.path(), 1), &Default::default())
            .unwrap_err();
        assert!(matches!(err, TrainerError::NoLossHead("lm")));
    }

    #[test]
    fn test_plm_fits_on_collated_permutation_samples() {
        let dir = tempfile::tempdir().unwrap();
        let mut module = tiny_module(dir.path(), TaskKind::Plm, 0.5);

        let tokenizer = module.tokenizer().unwrap().clone();
        let mut collator = Collator::new(TaskKind::Plm, tokenizer, 6, 1).unwrap();
        let lines: Vec<String> = ["a b c d e f", "g f e d c b", "b c d e f g", "c d e"]
            .iter()
            .map(|l| l.to_string())
            .collect();
        let samples = collator.collate(&lines).unwrap();
        assert!(samples.iter().all(|s| s.perm_mask.is_some() && s.target_count() > 0));

        let history = fit_module(
            &mut module,
            LmDataset::new(samples.clone()),
            LmDataset::new(samples),
            &fit_cfg(dir.path(), 2),
            &Default::default(),
        )
        .unwrap();
        assert!(history.iter().all(|m| m.train_loss.is_finite() && m.val_loss.is_finite()));
    }
}
