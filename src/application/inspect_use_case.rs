// ============================================================
// Layer 2 — Inspect Use Case
// ============================================================
// Builds a task module exactly as training would and reports
// what came out of the factory, without touching any data:
//
//   task, network, parameter count,
//   tokenizer vocabulary, embedding rows, output size
//
// Useful to check a model / tokenizer pairing before a long run.

use std::fmt;

use anyhow::{Context, Result};
use burn::prelude::Backend;

use crate::domain::{model_args::ModelArguments, task::TaskKind};
use crate::infra::tokenizer_store::vocab_size;
use crate::ml::factory::LanguageModule;

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleSummary {
    pub task:           TaskKind,
    pub num_params:     usize,
    pub tokenizer_size: Option<usize>,
    pub embedding_rows: usize,
    pub output_size:    usize,
}

impl fmt::Display for ModuleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "task:            {}", self.task)?;
        writeln!(f, "parameters:      {}", self.num_params)?;
        match self.tokenizer_size {
            Some(size) => writeln!(f, "tokenizer vocab: {size}")?,
            None => writeln!(f, "tokenizer vocab: (none)")?,
        }
        writeln!(f, "embedding rows:  {}", self.embedding_rows)?;
        write!(f, "output size:     {}", self.output_size)
    }
}

pub struct InspectUseCase {
    task: TaskKind,
    args: ModelArguments,
}

impl InspectUseCase {
    pub fn new(task: TaskKind, args: ModelArguments) -> Self {
        Self { task, args }
    }

    pub fn execute<B: Backend>(&self, device: &B::Device) -> Result<ModuleSummary> {
        let module = LanguageModule::<B>::build(self.task, self.args.clone(), device)
            .with_context(|| format!("Cannot build '{}' module", self.task))?;

        Ok(ModuleSummary {
            task:           module.task(),
            num_params:     module.num_params(),
            tokenizer_size: module.tokenizer().map(vocab_size),
            embedding_rows: module.embedding_rows(),
            output_size:    module.output_size(),
        })
    }
}
