// ============================================================
// Layer 3 — Model Arguments
// ============================================================
// The configuration a training module is built from.
// Supplied once at construction, never mutated afterwards.
//
// lr and lr_decay are kept as HyperParameter rather than f64
// so that an integer written in a config file ("lr": 1) stays
// distinguishable from a real number ("lr": 1.0). The module
// refuses integers when it configures its optimizer.

use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainerError};

/// A numeric hyperparameter that remembers how it was written.
///
/// `Integer` is tried first when deserialising, so JSON `1` lands
/// there while `1.0` and `1e-4` fall through to `Float`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HyperParameter {
    Integer(i64),
    Float(f64),
}

impl HyperParameter {
    /// The value as f64, rejecting anything that was not written as a real number
    pub fn require_float(self, name: &'static str) -> Result<f64> {
        match self {
            HyperParameter::Float(v) if v.is_finite() => Ok(v),
            other => Err(TrainerError::InvalidHyperParameter {
                name,
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for HyperParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HyperParameter::Integer(v) => write!(f, "{v}"),
            HyperParameter::Float(v)   => write!(f, "{v:?}"),
        }
    }
}

impl From<f64> for HyperParameter {
    fn from(v: f64) -> Self {
        HyperParameter::Float(v)
    }
}

impl From<i64> for HyperParameter {
    fn from(v: i64) -> Self {
        HyperParameter::Integer(v)
    }
}

/// CLI strings: "1" is an integer, "1.0" / "2e-5" are floats
impl FromStr for HyperParameter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(v) = s.parse::<i64>() {
            return Ok(HyperParameter::Integer(v));
        }
        s.parse::<f64>()
            .map(HyperParameter::Float)
            .map_err(|e| format!("'{s}' is not a number: {e}"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArguments {
    /// Hub repo id or local pretrained directory
    #[serde(default)]
    pub model_name_or_path: Option<String>,

    /// Architecture config to train from scratch when no weights are given
    #[serde(default)]
    pub model_config_name: Option<String>,

    #[serde(default)]
    pub tokenizer: Option<String>,

    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    #[serde(default = "default_lr")]
    pub lr: HyperParameter,

    #[serde(default)]
    pub weight_decay: f64,

    #[serde(default = "default_lr_decay")]
    pub lr_decay: HyperParameter,
}

fn default_lr() -> HyperParameter {
    HyperParameter::Float(2e-5)
}

fn default_lr_decay() -> HyperParameter {
    HyperParameter::Float(0.5)
}

impl Default for ModelArguments {
    fn default() -> Self {
        Self {
            model_name_or_path: None,
            model_config_name:  None,
            tokenizer:          None,
            cache_dir:          None,
            lr:                 default_lr(),
            weight_decay:       0.0,
            lr_decay:           default_lr_decay(),
        }
    }
}

impl ModelArguments {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_integer_stays_integer() {
        let args = ModelArguments::from_json_str(r#"{"lr": 1, "lr_decay": 0.5}"#).unwrap();
        assert_eq!(args.lr, HyperParameter::Integer(1));
        assert!(args.lr.require_float("lr").is_err());
    }

    #[test]
    fn test_json_float_accepted() {
        let args = ModelArguments::from_json_str(r#"{"lr": 1.0, "lr_decay": 1e-1}"#).unwrap();
        assert_eq!(args.lr.require_float("lr").unwrap(), 1.0);
        assert_eq!(args.lr_decay.require_float("lr_decay").unwrap(), 0.1);
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let args = ModelArguments::from_json_str(r#"{"model_config_name": "cfg"}"#).unwrap();
        assert_eq!(args.model_config_name.as_deref(), Some("cfg"));
        assert!(args.model_name_or_path.is_none());
        assert_eq!(args.weight_decay, 0.0);
        assert!(args.lr.require_float("lr").is_ok());
    }

    #[test]
    fn test_cli_strings() {
        assert_eq!("1".parse::<HyperParameter>().unwrap(), HyperParameter::Integer(1));
        assert_eq!("1.0".parse::<HyperParameter>().unwrap(), HyperParameter::Float(1.0));
        assert_eq!("2e-5".parse::<HyperParameter>().unwrap(), HyperParameter::Float(2e-5));
        assert!("fast".parse::<HyperParameter>().is_err());
    }

    #[test]
    fn test_error_names_the_parameter() {
        let err = HyperParameter::Integer(3).require_float("lr_decay").unwrap_err();
        assert_eq!(err.to_string(), "lr_decay should be float, got 3");
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(HyperParameter::Float(f64::NAN).require_float("lr").is_err());
    }
}
