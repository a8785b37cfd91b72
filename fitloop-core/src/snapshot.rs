//! Persisted progress snapshots for checkpoint and resume.

use crate::error::{FitloopError, Result};
use crate::persistence;
use crate::progress::{FitLoopProgress, Tracker};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A fit run's progress as written next to its checkpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub format_version: u32,
    pub run_id: Uuid,
    pub saved_at: DateTime<Utc>,
    pub progress: FitLoopProgress,
}

impl ProgressSnapshot {
    /// Snapshot for a new run.
    pub fn new(progress: FitLoopProgress) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            run_id: Uuid::new_v4(),
            saved_at: Utc::now(),
            progress,
        }
    }

    /// Replace the progress, keeping the run id, and stamp the save time.
    pub fn update(&mut self, progress: FitLoopProgress) {
        self.progress = progress;
        self.saved_at = Utc::now();
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        persistence::atomic_write_json(path, self)?;
        tracing::info!(
            path = %path.display(),
            run_id = %self.run_id,
            epochs_completed = self.progress.epochs_completed(),
            "saved progress snapshot"
        );
        Ok(())
    }

    /// Load a snapshot; `Ok(None)` if there is none at `path`.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let Some(snapshot) = persistence::load_json::<Self>(path)? else {
            return Ok(None);
        };
        snapshot.validate()?;
        tracing::info!(
            path = %path.display(),
            run_id = %snapshot.run_id,
            epochs_completed = snapshot.progress.epochs_completed(),
            "loaded progress snapshot"
        );
        Ok(Some(snapshot))
    }

    fn validate(&self) -> Result<()> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(FitloopError::snapshot(format!(
                "unsupported format version {} (expected {})",
                self.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }
        let progress = &self.progress;
        let loop_counters = [
            ("train epoch", &progress.train.epoch),
            ("train batch", &progress.train.batch_loop.batch),
            ("val epoch", &progress.val.epoch),
            ("val batch", &progress.val.batch),
        ];
        for (name, p) in loop_counters {
            if !(p.total.same_layout(&Tracker::new()) && p.current.same_layout(&Tracker::new())) {
                return Err(FitloopError::snapshot(format!(
                    "{name} progress has disabled counters"
                )));
            }
        }

        let batch_loop = &progress.train.batch_loop;
        // With no slots, only the initial index 0 is valid.
        let (idx, len) = (batch_loop.optimizer_idx(), batch_loop.num_optimizers());
        if idx >= len.max(1) {
            return Err(FitloopError::snapshot(format!(
                "optimizer index {idx} out of range for {len} optimizer(s)"
            )));
        }
        for (i, slot) in batch_loop.optimizations().iter().enumerate() {
            if !slot.has_default_layout() {
                return Err(FitloopError::snapshot(format!(
                    "optimizer slot {i} has an unexpected counter layout"
                )));
            }
        }
        Ok(())
    }
}
