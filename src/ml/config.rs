// ============================================================
// Layer 5 — Architecture Config
// ============================================================
// The serde view of a pretrained directory's config.json.
// Field names follow the HuggingFace convention so an existing
// config.json can be pointed at directly; unknown keys are
// ignored and missing ones fall back to a small default model.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchitectureConfig {
    pub model_type:              String,
    pub vocab_size:              usize,
    #[serde(alias = "d_model", alias = "n_embd")]
    pub hidden_size:             usize,
    #[serde(alias = "num_layers", alias = "n_layer")]
    pub num_hidden_layers:       usize,
    /// Only read by the encoder-decoder network
    pub num_decoder_layers:      usize,
    #[serde(alias = "n_head")]
    pub num_attention_heads:     usize,
    #[serde(alias = "d_ff", alias = "d_inner")]
    pub intermediate_size:       usize,
    #[serde(alias = "n_positions")]
    pub max_position_embeddings: usize,
    /// 0 disables token type embeddings
    pub type_vocab_size:         usize,
    #[serde(alias = "dropout")]
    pub hidden_dropout_prob:     f64,
    pub pad_token_id:            u32,
    pub decoder_start_token_id:  u32,
}

impl Default for ArchitectureConfig {
    fn default() -> Self {
        Self {
            model_type:              "transformer".to_string(),
            vocab_size:              30522,
            hidden_size:             256,
            num_hidden_layers:       6,
            num_decoder_layers:      6,
            num_attention_heads:     8,
            intermediate_size:       1024,
            max_position_embeddings: 512,
            type_vocab_size:         2,
            hidden_dropout_prob:     0.1,
            pad_token_id:            0,
            decoder_start_token_id:  0,
        }
    }
}

impl ArchitectureConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_huggingface_style_keys() {
        let cfg: ArchitectureConfig = serde_json::from_str(
            r#"{
                "model_type": "bert",
                "vocab_size": 1000,
                "hidden_size": 64,
                "num_hidden_layers": 2,
                "num_attention_heads": 4,
                "intermediate_size": 128,
                "max_position_embeddings": 128,
                "architectures": ["BertForMaskedLM"]
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.model_type, "bert");
        assert_eq!(cfg.vocab_size, 1000);
        assert_eq!(cfg.hidden_size, 64);
        assert_eq!(cfg.type_vocab_size, 2);
    }

    #[test]
    fn test_reads_aliases() {
        let cfg: ArchitectureConfig =
            serde_json::from_str(r#"{"d_model": 32, "n_head": 2, "d_inner": 64, "n_layer": 3}"#)
                .unwrap();
        assert_eq!(cfg.hidden_size, 32);
        assert_eq!(cfg.num_attention_heads, 2);
        assert_eq!(cfg.intermediate_size, 64);
        assert_eq!(cfg.num_hidden_layers, 3);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let cfg = ArchitectureConfig { vocab_size: 42, ..Default::default() };
        cfg.save(&path).unwrap();
        assert_eq!(ArchitectureConfig::load(&path).unwrap(), cfg);
    }
}
