// ============================================================
// Layer 5 — Task-Conditioned Model Factory
// ============================================================
// Maps a task tag to a ready-to-train module:
//
//   "lm"  → TaskModule<BaseModel>          (no tokenizer)
//   "mlm" → TaskModule<MaskedLmModel>
//   "clm" → TaskModule<CausalLmModel>      (+ <|sep|>, <|pad|>)
//   "cgm" → TaskModule<Seq2SeqLmModel>
//   "plm" → TaskModule<PermutationLmModel>
//
// Construction, in order:
//   1. model_name_or_path set → config.json + weights from it
//      otherwise model_config_name → config.json only, fresh weights
//   2. tasks other than lm → load tokenizer, (clm: add special
//      tokens), resize embeddings to the tokenizer's vocabulary
//
// Loader errors are passed through untouched.

use burn::{prelude::*, tensor::backend::AutodiffBackend};
use tokenizers::Tokenizer;

use crate::data::batcher::LmBatch;
use crate::domain::{model_args::ModelArguments, task::TaskKind, traits::ArtifactSource};
use crate::error::{Result, TrainerError};
use crate::infra::{
    checkpoint::{load_weights, CheckpointManager, WEIGHTS_FILE},
    hub::HubResolver,
    tokenizer_store::{add_special_tokens, load_tokenizer, vocab_size},
};
use crate::ml::config::{ArchitectureConfig, CONFIG_FILE};
use crate::ml::module::TaskModule;
use crate::ml::networks::{
    BaseModel, CausalLmModel, LanguageNetwork, MaskedLmModel, PermutationLmModel, Seq2SeqLmModel,
};

/// Separator injected into causal-LM tokenizers
pub const SEP_TOKEN: &str = "<|sep|>";
/// Padding token injected into causal-LM tokenizers
pub const PAD_TOKEN: &str = "<|pad|>";

pub enum LanguageModule<B: Backend> {
    Lm(TaskModule<B, BaseModel<B>>),
    Mlm(TaskModule<B, MaskedLmModel<B>>),
    Clm(TaskModule<B, CausalLmModel<B>>),
    Cgm(TaskModule<B, Seq2SeqLmModel<B>>),
    Plm(TaskModule<B, PermutationLmModel<B>>),
}

/// Run `$body` against whichever TaskModule `$module` holds
macro_rules! with_module {
    ($module:expr, $m:ident => $body:expr) => {
        match $module {
            LanguageModule::Lm($m)  => $body,
            LanguageModule::Mlm($m) => $body,
            LanguageModule::Clm($m) => $body,
            LanguageModule::Cgm($m) => $body,
            LanguageModule::Plm($m) => $body,
        }
    };
}
pub(crate) use with_module;

impl<B: Backend> LanguageModule<B> {
    /// Build through the HuggingFace hub / local paths, honouring `args.cache_dir`
    pub fn build(task: TaskKind, args: ModelArguments, device: &B::Device) -> Result<Self> {
        let source = HubResolver::new(args.cache_dir.clone());
        Self::build_with(task, args, &source, device)
    }

    pub fn build_with(
        task:   TaskKind,
        args:   ModelArguments,
        source: &dyn ArtifactSource,
        device: &B::Device,
    ) -> Result<Self> {
        tracing::info!("Building '{}' training module", task);
        Ok(match task {
            TaskKind::Lm  => Self::Lm(construct(task, args, source, device)?),
            TaskKind::Mlm => Self::Mlm(construct(task, args, source, device)?),
            TaskKind::Clm => Self::Clm(construct(task, args, source, device)?),
            TaskKind::Cgm => Self::Cgm(construct(task, args, source, device)?),
            TaskKind::Plm => Self::Plm(construct(task, args, source, device)?),
        })
    }

    pub fn task(&self) -> TaskKind {
        with_module!(self, m => m.task())
    }

    pub fn tokenizer(&self) -> Option<&Tokenizer> {
        with_module!(self, m => m.tokenizer())
    }

    pub fn architecture(&self) -> &ArchitectureConfig {
        with_module!(self, m => m.architecture())
    }

    pub fn embedding_rows(&self) -> usize {
        with_module!(self, m => m.model.embedding_rows())
    }

    pub fn output_size(&self) -> usize {
        with_module!(self, m => m.model.output_size())
    }

    pub fn num_params(&self) -> usize {
        with_module!(self, m => m.model.num_params())
    }

    pub fn forward(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        with_module!(self, m => m.forward(input_ids))
    }

    pub fn training_step(&mut self, batch: LmBatch<B>, batch_idx: usize) -> Result<Tensor<B, 1>> {
        with_module!(self, m => m.training_step(batch, batch_idx))
    }

    pub fn save_pretrained(&self, checkpoints: &CheckpointManager, name: &str) -> Result<std::path::PathBuf> {
        with_module!(self, m => checkpoints.save_pretrained(name, m))
    }
}

impl<B: AutodiffBackend> LanguageModule<B> {
    pub fn validation_step(
        &mut self,
        batch:     LmBatch<B::InnerBackend>,
        batch_idx: usize,
    ) -> Result<Tensor<B::InnerBackend, 1>> {
        with_module!(self, m => m.validation_step(batch, batch_idx))
    }

    /// Run configure_optimizers and report the monitored metric.
    /// The fit loop keeps the typed setup of the inner TaskModule instead.
    pub fn check_optimizer_config(&self) -> Result<&'static str> {
        with_module!(self, m => m.configure_optimizers().map(|setup| setup.monitor))
    }
}

fn construct<B: Backend, N: LanguageNetwork<B>>(
    task:   TaskKind,
    args:   ModelArguments,
    source: &dyn ArtifactSource,
    device: &B::Device,
) -> Result<TaskModule<B, N>> {
    let (mut architecture, mut model) =
        match (args.model_name_or_path.as_deref(), args.model_config_name.as_deref()) {
            (Some(identifier), _) => {
                let architecture = ArchitectureConfig::load(&source.resolve(identifier, CONFIG_FILE)?)?;
                let weights = source.resolve(identifier, WEIGHTS_FILE)?;
                let model = load_weights(N::init(&architecture, device), &weights, device)?;
                tracing::info!("Loaded pretrained {} weights from '{}'", N::NAME, identifier);
                (architecture, model)
            }
            (None, Some(config_name)) => {
                let architecture = ArchitectureConfig::load(&source.resolve(config_name, CONFIG_FILE)?)?;
                let model = N::init(&architecture, device);
                tracing::info!("Training from scratch");
                (architecture, model)
            }
            (None, None) => return Err(TrainerError::MissingModelSource),
        };

    let tokenizer = if task.needs_tokenizer() {
        let identifier = args
            .tokenizer
            .as_deref()
            .ok_or_else(|| TrainerError::MissingTokenizer(task.to_string()))?;
        let mut tokenizer = load_tokenizer(source, identifier)?;
        if task == TaskKind::Clm {
            add_special_tokens(&mut tokenizer, &[SEP_TOKEN, PAD_TOKEN]);
        }

        let size = vocab_size(&tokenizer);
        model = model.resize_token_embeddings(size);
        architecture.vocab_size = size;
        tracing::info!("Resized token embeddings to {} entries", size);
        Some(tokenizer)
    } else {
        None
    };

    Ok(TaskModule::new(task, args, model, tokenizer, architecture))
}
