// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by several layers:
//
//   hub.rs             : identifier → local file, through local
//                        paths or the HuggingFace hub (hf-hub)
//
//   tokenizer_store.rs : tokenizer loading, special tokens, and
//                        a word-level tokenizer built from the
//                        corpus when a run has none
//
//   checkpoint.rs      : pretrained directories (config.json,
//                        model.mpk, tokenizer.json) and the
//                        saved run configuration
//
//   metrics.rs         : per-step loss log and the per-epoch
//                        metrics.csv
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Local / HuggingFace hub artifact resolution
pub mod hub;

/// Tokenizer loading, building and saving
pub mod tokenizer_store;

/// Pretrained directory saving and weight loading
pub mod checkpoint;

/// Step log and CSV epoch metrics
pub mod metrics;
