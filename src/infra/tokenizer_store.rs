// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Loads tokenizers by identifier, injects special tokens, and
// builds a word-level tokenizer from the training corpus when a
// run has none.
//
// The built tokenizer is written as HuggingFace tokenizer JSON
// and reloaded through Tokenizer::from_file, which sidesteps the
// trainer / ModelWrapper type juggling of the tokenizers crate.
// Ids are contiguous from 0 so the vocabulary size is also the
// number of embedding rows the model needs.
//
// Reference: Sennrich et al. (2016) BPE paper

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokenizers::{AddedToken, Tokenizer};

use crate::domain::traits::ArtifactSource;
use crate::error::{Result, TrainerError};

pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Special tokens reserved at the front of a built vocabulary
const RESERVED: [&str; 5] = ["[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]"];

const PAD_CANDIDATES:  [&str; 3] = ["[PAD]", "<pad>", "<|pad|>"];
const MASK_CANDIDATES: [&str; 2] = ["[MASK]", "<mask>"];

/// Resolve `identifier` to a tokenizer.json and load it
pub fn load_tokenizer(source: &dyn ArtifactSource, identifier: &str) -> Result<Tokenizer> {
    let path = source.resolve(identifier, TOKENIZER_FILE)?;
    tracing::debug!("Loading tokenizer from '{}'", path.display());
    Tokenizer::from_file(&path).map_err(|e| {
        TrainerError::Tokenizer(format!("cannot load '{}': {e}", path.display()))
    })
}

/// Register `tokens` as special tokens; existing ones are left alone
pub fn add_special_tokens(tokenizer: &mut Tokenizer, tokens: &[&str]) -> usize {
    let added: Vec<AddedToken> = tokens
        .iter()
        .map(|t| AddedToken::from(t.to_string(), true))
        .collect();
    tokenizer.add_special_tokens(&added)
}

/// Number of embedding rows needed for this tokenizer, added tokens included.
/// Uses the highest id as a floor so sparse vocabularies never index out of range.
pub fn vocab_size(tokenizer: &Tokenizer) -> usize {
    let vocab  = tokenizer.get_vocab(true);
    let max_id = vocab.values().copied().max().map(|m| m as usize + 1).unwrap_or(0);
    vocab.len().max(max_id)
}

pub fn pad_token_id(tokenizer: &Tokenizer) -> Option<u32> {
    PAD_CANDIDATES.iter().find_map(|t| tokenizer.token_to_id(t))
}

pub fn mask_token_id(tokenizer: &Tokenizer) -> Option<u32> {
    MASK_CANDIDATES.iter().find_map(|t| tokenizer.token_to_id(t))
}

pub fn encode_ids(tokenizer: &Tokenizer, text: &str) -> Result<Vec<u32>> {
    tokenizer
        .encode(text, false)
        .map(|enc| enc.get_ids().to_vec())
        .map_err(|e| TrainerError::Tokenizer(format!("tokenisation failed: {e}")))
}

pub fn save_tokenizer(tokenizer: &Tokenizer, path: &Path) -> Result<()> {
    tokenizer
        .save(path, true)
        .map_err(|e| TrainerError::Tokenizer(format!("cannot save '{}': {e}", path.display())))
}

/// Builds and persists a corpus tokenizer inside a directory
pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    /// Load existing tokenizer or build a new one from texts
    pub fn load_or_build(&self, texts: &[String], vocab_size: usize) -> Result<Tokenizer> {
        let tok_path = self.path();
        if tok_path.exists() {
            tracing::info!("Loading existing tokenizer from '{}'", tok_path.display());
            Tokenizer::from_file(&tok_path)
                .map_err(|e| TrainerError::Tokenizer(format!("cannot reload tokenizer: {e}")))
        } else {
            tracing::info!("Building new tokenizer (vocab_size={})", vocab_size);
            self.build_and_save(texts, vocab_size)
        }
    }

    fn build_and_save(&self, texts: &[String], vocab_size: usize) -> Result<Tokenizer> {
        std::fs::create_dir_all(&self.dir)?;

        // ── Step 1: Word frequencies ──────────────────────────────────────────
        let mut freq: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for word in text.split_whitespace() {
                let w = word.to_lowercase();
                let w = w.trim_matches(|c: char| !c.is_alphanumeric());
                if !w.is_empty() {
                    *freq.entry(w.to_string()).or_insert(0) += 1;
                }
            }
        }

        // Most frequent first; ties broken alphabetically so builds are reproducible
        let mut words: Vec<(String, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        words.truncate(vocab_size.saturating_sub(RESERVED.len()));

        // ── Step 2: Contiguous vocabulary ─────────────────────────────────────
        let mut vocab = serde_json::Map::new();
        for (id, token) in RESERVED
            .iter()
            .map(|s| s.to_string())
            .chain(words.into_iter().map(|(w, _)| w))
            .enumerate()
        {
            vocab.entry(token).or_insert(serde_json::json!(id));
        }
        let size = vocab.len();

        // ── Step 3: HuggingFace tokenizer JSON ────────────────────────────────
        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": true,
                "strip_accents": null,
                "lowercase": true
            },
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": "[UNK]"
            }
        });

        let tok_path = self.path();
        std::fs::write(&tok_path, serde_json::to_string_pretty(&tokenizer_json)?)?;
        tracing::info!("Tokenizer built with {} entries, saved to '{}'", size, tok_path.display());

        Tokenizer::from_file(&tok_path)
            .map_err(|e| TrainerError::Tokenizer(format!("cannot reload tokenizer: {e}")))
    }
}
