// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from a corpus file to tensor batches:
//
//   corpus.txt
//       │
//       ▼
//   TextLoader        → non-empty lines
//       │
//       ▼
//   Preprocessor      → whitespace / control-char cleanup
//       │
//       ▼
//   Collator          → task-specific LmSamples (masking,
//                       targets, permutations, padding)
//       │
//       ▼
//   split_train_val   → held-out validation set if needed
//       │
//       ▼
//   LmDataset         → implements Burn's Dataset trait
//       │
//       ▼
//   LmBatcher         → stacks samples into an LmBatch
//
// Reference: Burn Book §4 (Datasets)

/// Reads corpus files line by line
pub mod loader;

/// Cleans and normalises raw text
pub mod preprocessor;

/// Per-task sample construction
pub mod collator;

/// Implements Burn's Dataset trait for LM samples
pub mod dataset;

/// Stacks samples into tensor batches
pub mod batcher;

/// Shuffles and splits data into train/validation sets
pub mod splitter;
