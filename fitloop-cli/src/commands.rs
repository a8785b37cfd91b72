//! Subcommand handlers.

use crate::{Commands, ConfigAction};
use anyhow::Context;
use fitloop_core::{
    FitLoopProgress, FitloopConfig, Progress, ProgressSnapshot, ReplaySummary, replay_fit,
};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub fn handle_command(
    command: Commands,
    workspace: &Path,
    config: &FitloopConfig,
) -> anyhow::Result<()> {
    match command {
        Commands::Run {
            epochs,
            train_batches,
            val_batches,
            snapshot,
        } => {
            let mut config = config.clone();
            if let Some(epochs) = epochs {
                config.run.max_epochs = epochs;
            }
            if let Some(batches) = train_batches {
                config.run.limit_train_batches = batches;
            }
            if let Some(batches) = val_batches {
                config.run.limit_val_batches = batches;
            }
            let path = snapshot_path(workspace, &config, snapshot);
            let (snapshot, summary) = run_fresh(&config, &path)?;
            print_summary(&path, &snapshot, &summary);
            Ok(())
        }
        Commands::Resume { snapshot, epochs } => {
            let path = snapshot_path(workspace, config, snapshot);
            let (snapshot, summary) = resume(config, &path, epochs)?;
            print_summary(&path, &snapshot, &summary);
            Ok(())
        }
        Commands::Inspect { path, json } => {
            let snapshot = ProgressSnapshot::load(&path)
                .with_context(|| format!("Failed to read snapshot {}", path.display()))?
                .with_context(|| format!("No snapshot at {}", path.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                println!("run {} (saved {})", snapshot.run_id, snapshot.saved_at);
                print!("{}", render_progress(&snapshot.progress));
            }
            Ok(())
        }
        Commands::Config { action } => handle_config(action, workspace, config),
    }
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config: &FitloopConfig,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".fitloop");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&FitloopConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            println!("{}", toml::to_string_pretty(config)?);
            Ok(())
        }
    }
}

fn snapshot_path(workspace: &Path, config: &FitloopConfig, explicit: Option<PathBuf>) -> PathBuf {
    match explicit {
        Some(path) if path.is_absolute() => path,
        Some(path) => workspace.join(path),
        None => config.snapshot.resolve(workspace),
    }
}

/// Replay a new run from scratch and save its snapshot at `path`.
fn run_fresh(
    config: &FitloopConfig,
    path: &Path,
) -> anyhow::Result<(ProgressSnapshot, ReplaySummary)> {
    let plan = config.run.to_plan();
    let mut progress = plan.fresh_progress();
    let summary = replay_fit(&plan, &mut progress)?;
    let snapshot = ProgressSnapshot::new(progress);
    snapshot
        .save(path)
        .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
    Ok((snapshot, summary))
}

/// Continue the run saved at `path` and write the updated snapshot back.
fn resume(
    config: &FitloopConfig,
    path: &Path,
    epochs: Option<u64>,
) -> anyhow::Result<(ProgressSnapshot, ReplaySummary)> {
    let mut snapshot = ProgressSnapshot::load(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?
        .with_context(|| format!("No snapshot to resume at {}", path.display()))?;

    let mut plan = config.run.to_plan();
    if let Some(epochs) = epochs {
        plan.max_epochs = epochs;
    }

    let mut progress = snapshot.progress.clone();
    let summary = replay_fit(&plan, &mut progress)?;
    snapshot.update(progress);
    snapshot
        .save(path)
        .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
    Ok((snapshot, summary))
}

fn print_summary(path: &Path, snapshot: &ProgressSnapshot, summary: &ReplaySummary) {
    println!(
        "Replayed {} epoch(s), {} train / {} val batch(es); {} epoch(s) completed in total",
        summary.epochs_run,
        summary.train_batches_run,
        summary.val_batches_run,
        snapshot.progress.epochs_completed()
    );
    println!("Snapshot written to: {}", path.display());
}

fn render_progress(progress: &FitLoopProgress) -> String {
    fn line(out: &mut String, label: &str, p: &Progress) {
        let _ = writeln!(out, "  {label:<24} total={} current={}", p.total, p.current);
    }

    let mut out = String::new();
    let train = &progress.train;
    let _ = writeln!(out, "train:");
    line(&mut out, "epoch", &train.epoch);
    line(&mut out, "batch", &train.batch_loop.batch);
    let _ = writeln!(out, "  optimizer_idx            {}", train.batch_loop.optimizer_idx());
    for (idx, opt) in train.batch_loop.optimizations().iter().enumerate() {
        line(&mut out, &format!("optimizer[{idx}].optimizer"), &opt.optimizer);
        line(&mut out, &format!("optimizer[{idx}].scheduler"), &opt.scheduler);
        line(&mut out, &format!("optimizer[{idx}].zero_grad"), &opt.zero_grad);
    }
    let _ = writeln!(out, "val:");
    line(&mut out, "epoch", &progress.val.epoch);
    line(&mut out, "batch", &progress.val.batch);
    out
}
