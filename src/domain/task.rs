// ============================================================
// Layer 3 — Task Tags
// ============================================================
// The five training tasks a module can be built for.
// The lowercase tag is what the CLI and config files use:
//
//   "lm"  → plain language model (backbone only, no head)
//   "mlm" → masked language model
//   "clm" → causal language model
//   "cgm" → conditional generation (encoder-decoder)
//   "plm" → permutation language model
//
// Reference: Rust Book §6 (Enums and Pattern Matching)

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::TrainerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Lm,
    Mlm,
    Clm,
    Cgm,
    Plm,
}

impl TaskKind {
    /// Every supported task, in tag order
    pub const ALL: [TaskKind; 5] = [
        TaskKind::Lm,
        TaskKind::Mlm,
        TaskKind::Clm,
        TaskKind::Cgm,
        TaskKind::Plm,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            TaskKind::Lm  => "lm",
            TaskKind::Mlm => "mlm",
            TaskKind::Clm => "clm",
            TaskKind::Cgm => "cgm",
            TaskKind::Plm => "plm",
        }
    }

    /// Only the plain LM runs without a tokenizer
    pub fn needs_tokenizer(self) -> bool {
        !matches!(self, TaskKind::Lm)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for TaskKind {
    type Err = TrainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        TaskKind::ALL
            .into_iter()
            .find(|t| t.tag() == lowered)
            .ok_or_else(|| TrainerError::UnknownTask(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_every_tag() {
        for task in TaskKind::ALL {
            assert_eq!(task.tag().parse::<TaskKind>().unwrap(), task);
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("CLM".parse::<TaskKind>().unwrap(), TaskKind::Clm);
        assert_eq!(" Plm ".parse::<TaskKind>().unwrap(), TaskKind::Plm);
    }

    #[test]
    fn test_rejects_unknown_tag() {
        let err = "seq2seq".parse::<TaskKind>().unwrap_err();
        assert!(matches!(err, TrainerError::UnknownTask(t) if t == "seq2seq"));
    }

    #[test]
    fn test_only_lm_skips_tokenizer() {
        let without: Vec<_> = TaskKind::ALL.into_iter().filter(|t| !t.needs_tokenizer()).collect();
        assert_eq!(without, vec![TaskKind::Lm]);
    }
}
