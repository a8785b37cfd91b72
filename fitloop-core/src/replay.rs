//! Deterministic replay of a fit run's event sequence.
//!
//! Drives a [`FitLoopProgress`] through epochs, batches, optimizer,
//! zero-grad and scheduler steps in the same order a training loop fires its
//! hooks, without running any model. Used to produce, resume and check
//! progress snapshots.

use crate::error::ProgressError;
use crate::progress::{FitLoopProgress, LoopProgress, TrainingLoopProgress};
use serde::{Deserialize, Serialize};

/// When a learning-rate scheduler steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerInterval {
    /// After every optimizer step.
    Step,
    /// Once at the end of each training epoch.
    Epoch,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerPlan {
    #[serde(default)]
    pub scheduler: Option<SchedulerInterval>,
}

/// Shape of a fit run to replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitPlan {
    /// Epoch count at which the run stops, counted across resumes.
    pub max_epochs: u64,
    pub train_batches: u64,
    pub val_batches: u64,
    pub optimizers: Vec<OptimizerPlan>,
}

impl Default for FitPlan {
    fn default() -> Self {
        Self {
            max_epochs: 1,
            train_batches: 1,
            val_batches: 0,
            optimizers: vec![OptimizerPlan {
                scheduler: Some(SchedulerInterval::Epoch),
            }],
        }
    }
}

impl FitPlan {
    pub fn validate(&self) -> Result<(), ProgressError> {
        if self.optimizers.is_empty() {
            return Err(ProgressError::InvalidPlan {
                reason: "at least one optimizer is required".to_string(),
            });
        }
        Ok(())
    }

    /// Progress for a fresh run of this plan, one slot per optimizer.
    pub fn fresh_progress(&self) -> FitLoopProgress {
        FitLoopProgress::new(self.optimizers.len())
    }
}

/// What a replay call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub epochs_run: u64,
    pub train_batches_run: u64,
    pub val_batches_run: u64,
}

/// Replay `plan` on `progress`, continuing from the epochs it has already
/// completed.
pub fn replay_fit(
    plan: &FitPlan,
    progress: &mut FitLoopProgress,
) -> Result<ReplaySummary, ProgressError> {
    plan.validate()?;
    let actual = progress.train.batch_loop.num_optimizers();
    if actual != plan.optimizers.len() {
        return Err(ProgressError::OptimizerCountMismatch {
            expected: plan.optimizers.len(),
            actual,
        });
    }

    progress.on_fit_start();
    let start = progress.epochs_completed();
    let mut summary = ReplaySummary::default();

    for epoch in start..plan.max_epochs {
        tracing::debug!(epoch, "replaying training epoch");
        run_train_epoch(plan, &mut progress.train)?;
        summary.epochs_run += 1;
        summary.train_batches_run += plan.train_batches;

        if plan.val_batches > 0 {
            run_val_epoch(plan.val_batches, &mut progress.val);
            summary.val_batches_run += plan.val_batches;
        }
    }

    tracing::debug!(
        epochs_run = summary.epochs_run,
        epochs_completed = progress.epochs_completed(),
        "replay finished"
    );
    Ok(summary)
}

fn run_train_epoch(plan: &FitPlan, train: &mut TrainingLoopProgress) -> Result<(), ProgressError> {
    train.reset_on_epoch();
    train.epoch.increment_ready();
    train.epoch.increment_started();

    for batch_idx in 0..plan.train_batches {
        tracing::trace!(batch_idx, "replaying training batch");
        run_train_batch(plan, train)?;
    }

    train.epoch.increment_processed();
    for (idx, opt) in plan.optimizers.iter().enumerate() {
        if opt.scheduler == Some(SchedulerInterval::Epoch) {
            step_scheduler(train, idx)?;
        }
    }
    // The plain increment keeps the last batch's `current` counters readable.
    train.epoch.increment_completed();
    Ok(())
}

fn run_train_batch(plan: &FitPlan, train: &mut TrainingLoopProgress) -> Result<(), ProgressError> {
    train.reset_on_batch();
    let batch_loop = &mut train.batch_loop;
    batch_loop.batch.increment_ready();
    batch_loop.batch.increment_started();

    for (idx, opt_plan) in plan.optimizers.iter().enumerate() {
        batch_loop.set_optimizer_idx(idx)?;
        let opt = batch_loop
            .active_mut()
            .ok_or(ProgressError::OptimizerIndexOutOfRange {
                index: idx,
                len: plan.optimizers.len(),
            })?;
        opt.optimizer.increment_ready();
        opt.optimizer.increment_started();
        opt.zero_grad.increment_ready();
        opt.zero_grad.increment_started();
        opt.zero_grad.increment_completed();
        opt.optimizer.increment_completed();
        if opt_plan.scheduler == Some(SchedulerInterval::Step) {
            opt.scheduler.increment_ready();
            opt.scheduler.increment_completed();
        }
    }

    batch_loop.batch.increment_processed();
    batch_loop.batch.increment_completed();
    Ok(())
}

fn step_scheduler(train: &mut TrainingLoopProgress, idx: usize) -> Result<(), ProgressError> {
    let len = train.batch_loop.num_optimizers();
    let opt = train
        .batch_loop
        .optimization_mut(idx)
        .ok_or(ProgressError::OptimizerIndexOutOfRange { index: idx, len })?;
    opt.scheduler.increment_ready();
    opt.scheduler.increment_completed();
    Ok(())
}

fn run_val_epoch(batches: u64, val: &mut LoopProgress) {
    val.epoch.increment_ready();
    val.epoch.increment_started();
    for _ in 0..batches {
        val.batch.increment_ready();
        val.batch.increment_started();
        val.batch.increment_processed();
        val.batch.increment_completed();
    }
    val.epoch.increment_processed();
    val.increment_epoch_completed();
}
