// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that describe WHAT a training run is,
// independent of Burn, the hub or the filesystem:
//
//   task.rs       : the five task tags (lm, mlm, clm, cgm, plm)
//   model_args.rs : the model configuration a module is built from
//   traits.rs     : seams implemented by the data and infra layers
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls (except reading a config file)

pub mod task;

pub mod model_args;

pub mod traits;
