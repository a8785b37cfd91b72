//! Loop-level progress aggregates built from [`Progress`] pairs.
//!
//! These counters are local to one trainer rank. They are not synced across
//! ranks.

use super::tracker::{Field, Progress, Tracker};
use crate::error::ProgressError;
use serde::{Deserialize, Serialize};

/// Optimizer, scheduler and zero-grad step progress for one optimizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationProgress {
    pub optimizer: Progress,
    pub scheduler: Progress,
    pub zero_grad: Progress,
}

impl Default for OptimizationProgress {
    fn default() -> Self {
        Self {
            optimizer: Progress::from_defaults(Tracker::new().disable(Field::Processed)),
            scheduler: Progress::from_defaults(
                Tracker::new()
                    .disable(Field::Started)
                    .disable(Field::Processed),
            ),
            zero_grad: Progress::from_defaults(Tracker::new().disable(Field::Processed)),
        }
    }
}

impl OptimizationProgress {
    pub fn optimizer_steps(&self) -> Result<u64, ProgressError> {
        self.optimizer.completed_total("optimizer_steps")
    }

    pub fn scheduler_steps(&self) -> Result<u64, ProgressError> {
        self.scheduler.completed_total("scheduler_steps")
    }

    /// Whether every tracker enables the same fields as a fresh slot.
    pub fn has_default_layout(&self) -> bool {
        let fresh = Self::default();
        [
            (&self.optimizer, &fresh.optimizer),
            (&self.scheduler, &fresh.scheduler),
            (&self.zero_grad, &fresh.zero_grad),
        ]
        .iter()
        .all(|(ours, expected)| {
            ours.total.same_layout(&expected.total) && ours.current.same_layout(&expected.current)
        })
    }

    /// Reset the per-batch counters of all three step kinds.
    pub fn reset_current(&mut self) {
        self.optimizer.current.reset();
        self.scheduler.current.reset();
        self.zero_grad.current.reset();
    }
}

/// Batch progress plus one [`OptimizationProgress`] slot per optimizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLoopProgress {
    pub batch: Progress,
    optimizer_idx: usize,
    optimizations: Vec<OptimizationProgress>,
}

impl Default for BatchLoopProgress {
    fn default() -> Self {
        Self::new(1)
    }
}

impl BatchLoopProgress {
    /// Create progress for `num_optimizers` optimizers, each slot owning its
    /// own counters.
    pub fn new(num_optimizers: usize) -> Self {
        Self {
            batch: Progress::default(),
            optimizer_idx: 0,
            optimizations: (0..num_optimizers)
                .map(|_| OptimizationProgress::default())
                .collect(),
        }
    }

    pub fn num_optimizers(&self) -> usize {
        self.optimizations.len()
    }

    pub fn optimizer_idx(&self) -> usize {
        self.optimizer_idx
    }

    /// Select the active optimizer slot.
    pub fn set_optimizer_idx(&mut self, index: usize) -> Result<(), ProgressError> {
        if index >= self.optimizations.len() {
            return Err(ProgressError::OptimizerIndexOutOfRange {
                index,
                len: self.optimizations.len(),
            });
        }
        self.optimizer_idx = index;
        Ok(())
    }

    pub fn optimizations(&self) -> &[OptimizationProgress] {
        &self.optimizations
    }

    pub fn optimization(&self, index: usize) -> Option<&OptimizationProgress> {
        self.optimizations.get(index)
    }

    pub fn optimization_mut(&mut self, index: usize) -> Option<&mut OptimizationProgress> {
        self.optimizations.get_mut(index)
    }

    /// Slot of the currently active optimizer.
    pub fn active_mut(&mut self) -> Option<&mut OptimizationProgress> {
        self.optimizations.get_mut(self.optimizer_idx)
    }

    /// Reset the per-batch counters of every optimizer slot, leaving `batch`.
    pub fn reset_optimizations(&mut self) {
        for opt in &mut self.optimizations {
            opt.reset_current();
        }
    }

    pub fn reset_on_batch(&mut self) {
        self.reset_optimizations();
        self.batch.current.reset();
    }
}

/// Epoch and batch progress of an evaluation loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopProgress {
    pub epoch: Progress,
    pub batch: Progress,
}

impl LoopProgress {
    pub fn increment_epoch_completed(&mut self) {
        self.epoch.increment_completed();
        self.reset_on_epoch();
    }

    pub fn reset_on_epoch(&mut self) {
        self.batch.current.reset();
        self.epoch.current.reset();
    }
}

/// Epoch progress of the training loop plus its batch loop.
///
/// Unlike [`LoopProgress`], finishing an epoch here does not reset
/// `epoch.current`: the epoch reset only cascades into the batch loop, and the
/// per-epoch counters keep accumulating until the caller resets them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingLoopProgress {
    pub epoch: Progress,
    pub batch_loop: BatchLoopProgress,
}

impl TrainingLoopProgress {
    pub fn new(num_optimizers: usize) -> Self {
        Self {
            epoch: Progress::default(),
            batch_loop: BatchLoopProgress::new(num_optimizers),
        }
    }

    pub fn increment_epoch_completed(&mut self) {
        self.epoch.increment_completed();
        self.reset_on_epoch();
    }

    pub fn reset_on_batch(&mut self) {
        self.batch_loop.reset_on_batch();
    }

    pub fn reset_on_epoch(&mut self) {
        // leaves `epoch.current` alone
        self.batch_loop.reset_on_batch();
    }
}

/// Progress of one fit invocation: the training loop and the validation loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitLoopProgress {
    pub train: TrainingLoopProgress,
    pub val: LoopProgress,
}

impl FitLoopProgress {
    pub fn new(num_optimizers: usize) -> Self {
        Self {
            train: TrainingLoopProgress::new(num_optimizers),
            val: LoopProgress::default(),
        }
    }

    /// Start a new fit call, fresh or resumed: per-invocation epoch counters
    /// go back to zero while totals are kept.
    pub fn on_fit_start(&mut self) {
        self.train.epoch.current.reset();
        self.val.epoch.current.reset();
    }

    pub fn epochs_completed(&self) -> u64 {
        self.train.epoch.total.completed().unwrap_or(0)
    }
}
