// ============================================================
// Layer 6 — Model Hub Resolver
// ============================================================
// Turns a model / tokenizer identifier into a local file.
//
// Resolution order for resolve(identifier, file):
//   1. identifier is an existing file       → that file
//   2. identifier is an existing directory  → {identifier}/{file}
//   3. otherwise it is a HuggingFace repo id → downloaded through
//      hf-hub into the cache directory (or hf-hub's default cache)
//
// Failures are not retried; they surface as TrainerError::Hub
// with the identifier that could not be resolved.

use std::path::{Path, PathBuf};

use crate::domain::traits::ArtifactSource;
use crate::error::{Result, TrainerError};

pub struct HubResolver {
    cache_dir: Option<PathBuf>,
    token:     Option<String>,
}

impl HubResolver {
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        Self { cache_dir, token: Self::resolve_token() }
    }

    /// HF_TOKEN from the environment, ignored when empty
    fn resolve_token() -> Option<String> {
        std::env::var("HF_TOKEN").ok().filter(|t| !t.trim().is_empty())
    }

    fn build_api(&self, identifier: &str) -> Result<hf_hub::api::sync::Api> {
        let mut builder = hf_hub::api::sync::ApiBuilder::new();
        if let Some(dir) = &self.cache_dir {
            builder = builder.with_cache_dir(dir.clone());
        }
        if let Some(token) = &self.token {
            builder = builder.with_token(Some(token.clone()));
        }
        builder
            .build()
            .map_err(|e| TrainerError::hub(identifier, format!("cannot initialise hub client: {e}")))
    }

    fn resolve_local(identifier: &str, path: &Path, file: &str) -> Result<PathBuf> {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        let candidate = path.join(file);
        if candidate.is_file() {
            Ok(candidate)
        } else {
            Err(TrainerError::hub(
                identifier,
                format!("'{}' not found in local directory", file),
            ))
        }
    }
}

impl ArtifactSource for HubResolver {
    fn resolve(&self, identifier: &str, file: &str) -> Result<PathBuf> {
        let local = Path::new(identifier);
        if local.exists() {
            tracing::debug!("Resolving '{}' from local path '{}'", file, local.display());
            return Self::resolve_local(identifier, local, file);
        }

        tracing::info!("Fetching '{}' from hub repo '{}'", file, identifier);
        let api = self.build_api(identifier)?;
        api.model(identifier.to_string())
            .get(file)
            .map_err(|e| TrainerError::hub(identifier, e))
    }
}
