// ============================================================
// Layer 5 — Training Module
// ============================================================
// A TaskModule pairs one network with its configuration and
// (except for the plain LM) its tokenizer, and exposes the four
// hooks a training loop calls:
//
//   forward(input_ids)            → network logits, unchanged
//   training_step(batch, idx)     → network loss, logged as "train_loss"
//   validation_step(batch, idx)   → network loss, logged as "val_loss",
//                                   computed by model.valid() (no dropout)
//   configure_optimizers()        → AdamW + per-epoch exponential decay,
//                                   monitored against "val_loss"
//
// The hooks never compute anything themselves: loss comes from
// the network, the update rule from burn::optim, the schedule
// from burn::lr_scheduler.

use std::marker::PhantomData;

use burn::{
    lr_scheduler::exponential::{ExponentialLrScheduler, ExponentialLrSchedulerConfig},
    module::AutodiffModule,
    optim::{AdamWConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use tokenizers::Tokenizer;

use crate::data::batcher::LmBatch;
use crate::domain::{model_args::ModelArguments, task::TaskKind};
use crate::error::{Result, TrainerError};
use crate::infra::metrics::{StepLog, TRAIN_LOSS, VAL_LOSS};
use crate::ml::config::ArchitectureConfig;
use crate::ml::networks::{require_loss, LanguageNetwork};

/// Metric the learning-rate schedule is tied to
pub const MONITOR: &str = VAL_LOSS;

/// What configure_optimizers hands to the training loop
pub struct OptimizerSetup<O> {
    pub optimizer:    O,
    /// Stepped once per epoch; each step multiplies the rate by lr_decay
    pub lr_scheduler: ExponentialLrScheduler,
    pub monitor:      &'static str,
}

pub struct TaskModule<B: Backend, N: LanguageNetwork<B>> {
    task:         TaskKind,
    args:         ModelArguments,
    pub model:    N,
    tokenizer:    Option<Tokenizer>,
    architecture: ArchitectureConfig,
    log:          StepLog,
    _backend:     PhantomData<B>,
}

impl<B: Backend, N: LanguageNetwork<B>> TaskModule<B, N> {
    pub fn new(
        task:         TaskKind,
        args:         ModelArguments,
        model:        N,
        tokenizer:    Option<Tokenizer>,
        architecture: ArchitectureConfig,
    ) -> Self {
        Self {
            task,
            args,
            model,
            tokenizer,
            architecture,
            log: StepLog::default(),
            _backend: PhantomData,
        }
    }

    pub fn task(&self) -> TaskKind {
        self.task
    }

    pub fn tokenizer(&self) -> Option<&Tokenizer> {
        self.tokenizer.as_ref()
    }

    /// Architecture of the current network, vocabulary size included
    pub fn architecture(&self) -> &ArchitectureConfig {
        &self.architecture
    }

    pub fn step_log(&self) -> &StepLog {
        &self.log
    }

    pub fn step_log_mut(&mut self) -> &mut StepLog {
        &mut self.log
    }

    /// input_ids: [batch, seq] → logits: [batch, seq, output_size]
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        self.model.forward(input_ids)
    }

    pub fn training_step(&mut self, batch: LmBatch<B>, _batch_idx: usize) -> Result<Tensor<B, 1>> {
        logged_loss(&mut self.log, &self.model, batch, TRAIN_LOSS)
    }
}

/// Run one batch through `model` and record its loss under `metric`
fn logged_loss<B: Backend, M: LanguageNetwork<B>>(
    log:    &mut StepLog,
    model:  &M,
    batch:  LmBatch<B>,
    metric: &'static str,
) -> Result<Tensor<B, 1>> {
    let output = model.forward_batch(batch);
    let loss = require_loss::<B, M>(&output)?;
    log.record(metric, loss.clone().into_scalar().elem::<f64>());
    Ok(loss)
}

impl<B, N> TaskModule<B, N>
where
    B: AutodiffBackend,
    N: LanguageNetwork<B> + AutodiffModule<B>,
    N::InnerModule: LanguageNetwork<B::InnerBackend>,
{
    /// Evaluation-mode step: the network runs on the inner backend,
    /// where dropout is a no-op and no graph is recorded
    pub fn validation_step(
        &mut self,
        batch:      LmBatch<B::InnerBackend>,
        _batch_idx: usize,
    ) -> Result<Tensor<B::InnerBackend, 1>> {
        let model = self.model.valid();
        logged_loss(&mut self.log, &model, batch, VAL_LOSS)
    }

    /// AdamW plus a per-epoch exponential decay. The scheduler only accepts
    /// `lr` and `lr_decay` in (0, 1]; anything else is `TrainerError::Scheduler`.
    pub fn configure_optimizers(&self) -> Result<OptimizerSetup<impl Optimizer<N, B>>> {
        let lr       = self.args.lr.require_float("lr")?;
        let lr_decay = self.args.lr_decay.require_float("lr_decay")?;

        let optimizer = AdamWConfig::new()
            .with_weight_decay(self.args.weight_decay as f32)
            .init::<B, N>();

        let lr_scheduler = ExponentialLrSchedulerConfig::new(lr, lr_decay)
            .init()
            .map_err(TrainerError::Scheduler)?;

        tracing::debug!(
            "AdamW lr={} weight_decay={} decay={} per epoch",
            lr,
            self.args.weight_decay,
            lr_decay
        );

        Ok(OptimizerSetup { optimizer, lr_scheduler, monitor: MONITOR })
    }

    /// Back-propagate `loss` and apply one optimizer update to the network
    pub fn apply_gradients<O: Optimizer<N, B>>(&mut self, optimizer: &mut O, lr: f64, loss: Tensor<B, 1>) {
        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.model = optimizer.step(lr, self.model.clone(), grads);
    }
}
