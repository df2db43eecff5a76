// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers for one user-facing goal.
//
// Rules for this layer:
//   - No tensor math or network code here
//   - No printing here (that's Layer 1)
//   - Library errors are wrapped in anyhow with context
//
// Reference: Clean Architecture pattern

/// Corpus → tokenizer → task module → fit loop
pub mod train_use_case;

/// Build a task module and summarise it
pub mod inspect_use_case;
