//! Training Infrastructure
//!
//! Training loop, checkpointing, and evaluation utilities.

pub mod checkpoint;
pub mod eval;
pub mod trainer;

pub use checkpoint::{CheckpointStore, SnapshotMeta};
pub use eval::{load_evaluations, EvalEntry, EvalProbe};
pub use trainer::{Phase, TrainingLoop, TrainingOutcome};
