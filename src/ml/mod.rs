// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All network, loss and optimisation code lives here.
//
//   config.rs   : architecture config.json (HF-style field names)
//   loss.rs     : cross-entropy that skips -100 labels
//   resize.rs   : grow / shrink vocabulary-indexed parameters
//   networks.rs : one network per task, assembled from burn::nn
//                 transformer blocks
//   module.rs   : TaskModule: the four training hooks
//   factory.rs  : task tag → configured TaskModule
//   trainer.rs  : epoch loop driving the hooks
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

pub mod config;

pub mod loss;

pub mod resize;

pub mod networks;

pub mod module;

/// Task-conditioned module construction
pub mod factory;

/// Fit loop with validation, metrics and checkpointing
pub mod trainer;
