// ============================================================
// Crate Error Type
// ============================================================
// Every library-level failure is one variant of TrainerError.
// The CLI and application layers wrap it in anyhow with context;
// everything below them returns this type so callers can match
// on the validation failures explicitly.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrainerError>;

#[derive(Debug, Error)]
pub enum TrainerError {
    /// Neither `model_name_or_path` nor `model_config_name` was given
    #[error("either model_name_or_path or model_config_name must be set")]
    MissingModelSource,

    /// Task variants other than `lm` need a tokenizer identifier
    #[error("task '{0}' requires a tokenizer identifier")]
    MissingTokenizer(String),

    /// `lr` / `lr_decay` were not real numbers
    #[error("{name} should be float, got {value}")]
    InvalidHyperParameter { name: &'static str, value: String },

    #[error("unknown task '{0}', expected one of: lm, mlm, clm, cgm, plm")]
    UnknownTask(String),

    /// The plain language model carries no loss head
    #[error("network '{0}' has no built-in loss")]
    NoLossHead(&'static str),

    #[error("batch is missing labels required by '{0}'")]
    MissingLabels(&'static str),

    #[error("model hub error for '{identifier}': {message}")]
    Hub { identifier: String, message: String },

    /// Token ids from the tokenizer would overrun the embedding table
    #[error("tokenizer has {tokenizer} entries but the embedding table only {embeddings} rows")]
    VocabularyMismatch { tokenizer: usize, embeddings: usize },

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("learning-rate scheduler error: {0}")]
    Scheduler(String),

    #[error("record error: {0}")]
    Record(#[from] burn::record::RecorderError),

    #[error("corpus '{0}' contains no usable examples")]
    EmptyCorpus(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl TrainerError {
    pub fn hub(identifier: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Hub { identifier: identifier.into(), message: message.to_string() }
    }
}
