//! Progress tracking for fit runs.
//!
//! A [`Tracker`] counts how many events became ready, started, were processed
//! and completed; a [`Progress`] pairs a run-wide `total` tracker with a
//! periodically reset `current` one. The loop types compose these into the
//! nested record kept by a fit call and persisted with its checkpoints.

pub mod loops;
pub mod tracker;

pub use loops::{
    BatchLoopProgress, FitLoopProgress, LoopProgress, OptimizationProgress, TrainingLoopProgress,
};
pub use tracker::{Counter, Field, Progress, Tracker};
