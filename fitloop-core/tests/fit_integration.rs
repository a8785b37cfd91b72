//! End-to-end tests: replayed fit runs, snapshots and resumption.

use fitloop_core::{
    Field, FitLoopProgress, FitPlan, OptimizerPlan, ProgressError, ProgressSnapshot,
    SchedulerInterval, Tracker, replay_fit,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn all(value: u64) -> Tracker {
    Field::ALL
        .iter()
        .fold(Tracker::new(), |t, f| t.with(*f, value))
}

/// Tracker for steps that have no `processed` phase.
fn step(value: u64) -> Tracker {
    all(value).disable(Field::Processed)
}

/// Tracker for scheduler steps, which have neither `started` nor `processed`.
fn sched(value: u64) -> Tracker {
    step(value).disable(Field::Started)
}

fn three_optimizer_plan(max_epochs: u64) -> FitPlan {
    FitPlan {
        max_epochs,
        train_batches: 3,
        val_batches: 0,
        optimizers: vec![
            OptimizerPlan {
                scheduler: Some(SchedulerInterval::Epoch),
            },
            OptimizerPlan {
                scheduler: Some(SchedulerInterval::Step),
            },
            OptimizerPlan { scheduler: None },
        ],
    }
}

#[test]
fn two_epochs_three_batches_one_optimizer() {
    let plan = FitPlan {
        max_epochs: 2,
        train_batches: 3,
        ..Default::default()
    };
    let mut progress = plan.fresh_progress();
    replay_fit(&plan, &mut progress).unwrap();

    let train = &progress.train;
    assert_eq!(train.epoch.total, all(2));
    assert_eq!(train.batch_loop.batch.total, all(6));
    // only the last batch of the last epoch
    assert_eq!(train.batch_loop.batch.current, all(1));
    assert_eq!(train.batch_loop.optimizer_idx(), 0);
}

#[test]
fn three_optimizers_track_independently() {
    let plan = three_optimizer_plan(2);
    let mut progress = plan.fresh_progress();
    replay_fit(&plan, &mut progress).unwrap();

    let train = &progress.train;
    assert_eq!(train.epoch.total, all(2));
    // The training loop never clears `epoch.current` on epoch end.
    assert_eq!(train.epoch.current, all(2));

    let batch_loop = &train.batch_loop;
    assert_eq!(batch_loop.batch.total, all(6));
    assert_eq!(batch_loop.batch.current, all(1));

    for opt in batch_loop.optimizations() {
        assert_eq!(opt.optimizer.total, step(6));
        assert_eq!(opt.optimizer.current, step(1));
        assert_eq!(opt.zero_grad.total, step(6));
        assert_eq!(opt.zero_grad.current, step(1));
    }

    let opts = batch_loop.optimizations();
    // stepped once per epoch
    assert_eq!(opts[0].scheduler.total, sched(2));
    assert_eq!(opts[0].scheduler.current, sched(1));
    // stepped once per optimizer step
    assert_eq!(opts[1].scheduler.total, sched(6));
    assert_eq!(opts[1].scheduler.current, sched(1));
    // no scheduler
    assert_eq!(opts[2].scheduler.total, sched(0));
    assert_eq!(opts[2].scheduler.current, sched(0));

    assert_eq!(batch_loop.optimizer_idx(), 2);
}

#[test]
fn resume_from_snapshot_continues_totals() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ckpt").join("progress.json");

    let plan = three_optimizer_plan(2);
    let mut progress = plan.fresh_progress();
    replay_fit(&plan, &mut progress).unwrap();
    let snapshot = ProgressSnapshot::new(progress);
    snapshot.save(&path).unwrap();

    let mut restored = ProgressSnapshot::load(&path).unwrap().unwrap();
    assert_eq!(restored.run_id, snapshot.run_id);

    let plan = three_optimizer_plan(3);
    let summary = replay_fit(&plan, &mut restored.progress).unwrap();
    assert_eq!(summary.epochs_run, 1);

    let train = &restored.progress.train;
    assert_eq!(train.epoch.total, all(3));
    assert_eq!(train.epoch.current, all(1));
    assert_eq!(train.batch_loop.batch.total, all(9));
    assert_eq!(train.batch_loop.optimizations()[0].scheduler_steps().unwrap(), 3);
    assert_eq!(train.batch_loop.optimizations()[1].scheduler_steps().unwrap(), 9);
}

#[test]
fn resume_with_different_optimizer_count_fails() {
    let plan = three_optimizer_plan(1);
    let mut progress = plan.fresh_progress();
    replay_fit(&plan, &mut progress).unwrap();

    let single = FitPlan {
        max_epochs: 2,
        ..Default::default()
    };
    assert_eq!(
        replay_fit(&single, &mut progress).unwrap_err(),
        ProgressError::OptimizerCountMismatch {
            expected: 1,
            actual: 3
        }
    );
}

#[test]
fn validation_loop_runs_after_each_train_epoch() {
    let plan = FitPlan {
        max_epochs: 3,
        train_batches: 2,
        val_batches: 2,
        ..Default::default()
    };
    let mut progress = FitLoopProgress::new(1);
    replay_fit(&plan, &mut progress).unwrap();

    assert_eq!(progress.val.epoch.total, all(3));
    assert_eq!(progress.val.epoch.current, Tracker::new());
    assert_eq!(progress.val.batch.total, all(6));
    assert_eq!(progress.val.batch.current, Tracker::new());
    assert_eq!(progress.train.epoch.total, all(3));
}
