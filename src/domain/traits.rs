// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams between the layers. The factory only sees
// ArtifactSource, the training use case only sees TextSource,
// so a local-directory resolver, the HuggingFace hub or a test
// double can be swapped in without touching either.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use std::path::PathBuf;

use crate::error::Result;

// ─── ArtifactSource ───────────────────────────────────────────────────────────
/// Anything that can turn a model identifier plus a file name
/// into a readable path on the local filesystem.
///
/// Implementations:
///   - HubResolver → local directories first, then the HuggingFace hub
pub trait ArtifactSource {
    /// Resolve `file` (e.g. "config.json") for `identifier`.
    fn resolve(&self, identifier: &str, file: &str) -> Result<PathBuf>;
}

// ─── TextSource ───────────────────────────────────────────────────────────────
/// Any component that yields raw training examples.
///
/// Implementations:
///   - TextLoader → one example per line of a UTF-8 file
pub trait TextSource {
    fn load_all(&self) -> Result<Vec<String>>;
}
