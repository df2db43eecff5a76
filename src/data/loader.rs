// ============================================================
// Layer 4 — Corpus Loader
// ============================================================
// Reads a UTF-8 text corpus, one training example per line.
//
//   mlm / clm / plm / lm :  <text>
//   cgm                  :  <source>\t<target>
//
// Blank lines are skipped. Lines are returned raw; cleaning is
// the Preprocessor's job so the tab separator survives loading.
//
// Reference: Rust Book §12 (An I/O Project)

use std::{fs, path::PathBuf};

use crate::domain::traits::TextSource;
use crate::error::{Result, TrainerError};

/// Loads the non-empty lines of a corpus file.
/// Implements the TextSource trait from Layer 3.
pub struct TextLoader {
    path: PathBuf,
}

impl TextLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TextSource for TextLoader {
    fn load_all(&self) -> Result<Vec<String>> {
        let raw = fs::read_to_string(&self.path)?;

        let lines: Vec<String> = raw
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect();

        if lines.is_empty() {
            return Err(TrainerError::EmptyCorpus(self.path.display().to_string()));
        }

        tracing::info!("Loaded {} examples from '{}'", lines.len(), self.path.display());
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.txt");
        fs::write(&path, "first line\n\n   \nsecond\tline\n").unwrap();

        let lines = TextLoader::new(&path).load_all().unwrap();
        assert_eq!(lines, vec!["first line".to_string(), "second\tline".to_string()]);
    }

    #[test]
    fn test_empty_corpus_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        fs::write(&path, "\n\n").unwrap();

        assert!(matches!(TextLoader::new(&path).load_all(), Err(TrainerError::EmptyCorpus(_))));
    }

    #[test]
    fn test_missing_file_propagates_io_error() {
        let err = TextLoader::new("/definitely/not/here.txt").load_all().unwrap_err();
        assert!(matches!(err, TrainerError::Io(_)));
    }
}
