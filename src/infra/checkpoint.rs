// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves a training module as a pretrained directory that the
// factory can load back through model_name_or_path / tokenizer:
//
//   {output_dir}/
//     train_config.json        ← run configuration
//     checkpoint-epoch-1/
//       config.json            ← architecture, current vocab size
//       model.mpk              ← weights (NamedMpkFileRecorder, full precision)
//       tokenizer.json         ← only for tasks with a tokenizer
//     best/                    ← same layout, lowest val_loss so far
//
// Recorders take the path without extension and append their own,
// so resolved "…/model.mpk" paths can be handed over unchanged.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use std::{
    fs,
    path::{Path, PathBuf},
};

use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};
use serde::Serialize;

use crate::error::Result;
use crate::infra::tokenizer_store::{save_tokenizer, TOKENIZER_FILE};
use crate::ml::config::CONFIG_FILE;
use crate::ml::module::TaskModule;
use crate::ml::networks::LanguageNetwork;

pub const WEIGHTS_FILE: &str = "model.mpk";
pub const TRAIN_CONFIG_FILE: &str = "train_config.json";

fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
    NamedMpkFileRecorder::<FullPrecisionSettings>::new()
}

/// Load weights saved by `save_pretrained` into a network of matching shape
pub fn load_weights<B: Backend, N: LanguageNetwork<B>>(
    model:   N,
    weights: &Path,
    device:  &B::Device,
) -> Result<N> {
    let record = recorder().load(weights.to_path_buf(), device)?;
    Ok(model.load_record(record))
}

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write `module` to `{dir}/{name}/` and return that directory
    pub fn save_pretrained<B: Backend, N: LanguageNetwork<B>>(
        &self,
        name:   &str,
        module: &TaskModule<B, N>,
    ) -> Result<PathBuf> {
        let target = self.dir.join(name);
        fs::create_dir_all(&target)?;

        module.architecture().save(&target.join(CONFIG_FILE))?;

        recorder().record(module.model.clone().into_record(), target.join(WEIGHTS_FILE))?;

        if let Some(tokenizer) = module.tokenizer() {
            save_tokenizer(tokenizer, &target.join(TOKENIZER_FILE))?;
        }

        tracing::debug!("Saved {} module to '{}'", module.task(), target.display());
        Ok(target)
    }

    /// Save the run configuration next to the checkpoints
    pub fn save_config<T: Serialize>(&self, cfg: &T) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(TRAIN_CONFIG_FILE);
        fs::write(&path, serde_json::to_string_pretty(cfg)?)?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }
}
