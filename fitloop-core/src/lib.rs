//! # fitloop-core
//!
//! Bookkeeping for training runs: nested progress counters for epochs,
//! batches, optimizer, scheduler and zero-grad steps, their replay and
//! persistence for resumption, and unwrapping of user models from
//! distributed-training wrappers.

pub mod config;
pub mod error;
pub mod persistence;
pub mod progress;
pub mod replay;
pub mod snapshot;
pub mod wrappers;

pub use config::{FitloopConfig, load_config};
pub use error::{FitloopError, ProgressError, Result, WrapperError};
pub use progress::{
    BatchLoopProgress, Counter, Field, FitLoopProgress, LoopProgress, OptimizationProgress,
    Progress, Tracker, TrainingLoopProgress,
};
pub use replay::{FitPlan, OptimizerPlan, ReplaySummary, SchedulerInterval, replay_fit};
pub use snapshot::ProgressSnapshot;
pub use wrappers::{ModelWrapper, unwrap_model};
