//! Configuration system for fitloop.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/fitloop/config.toml` and/or `.fitloop/config.toml`
//! in the workspace directory.

use crate::replay::{FitPlan, OptimizerPlan, SchedulerInterval};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitloopConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Shape of the fit run to replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_max_epochs")]
    pub max_epochs: u64,
    #[serde(default = "default_train_batches")]
    pub limit_train_batches: u64,
    #[serde(default)]
    pub limit_val_batches: u64,
    /// One entry per optimizer.
    #[serde(default = "default_optimizers")]
    pub optimizers: Vec<OptimizerConfig>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_epochs: default_max_epochs(),
            limit_train_batches: default_train_batches(),
            limit_val_batches: 0,
            optimizers: default_optimizers(),
        }
    }
}

impl RunConfig {
    pub fn to_plan(&self) -> FitPlan {
        FitPlan {
            max_epochs: self.max_epochs,
            train_batches: self.limit_train_batches,
            val_batches: self.limit_val_batches,
            optimizers: self
                .optimizers
                .iter()
                .map(|opt| OptimizerPlan {
                    scheduler: opt.scheduler_interval,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Scheduler attached to this optimizer, if any.
    #[serde(default)]
    pub scheduler_interval: Option<SchedulerInterval>,
}

fn default_max_epochs() -> u64 {
    2
}

fn default_train_batches() -> u64 {
    3
}

fn default_optimizers() -> Vec<OptimizerConfig> {
    vec![OptimizerConfig {
        scheduler_interval: Some(SchedulerInterval::Epoch),
    }]
}

/// Where progress snapshots are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Snapshot path, relative to the workspace unless absolute.
    #[serde(default = "default_snapshot_path")]
    pub path: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: default_snapshot_path(),
        }
    }
}

impl SnapshotConfig {
    pub fn resolve(&self, workspace: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            workspace.join(&self.path)
        }
    }
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from(".fitloop/progress.json")
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when neither `RUST_LOG` nor verbosity flags are given.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for daily-rolling JSON logs. Disabled when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: None,
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "fitloop", "fitloop")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".fitloop").join("config.toml")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `FITLOOP_`)
/// 3. Workspace-local config (`.fitloop/config.toml`)
/// 4. User config (`~/.config/fitloop/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&FitloopConfig>,
) -> Result<FitloopConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(FitloopConfig::default()));

    if let Some(user_config) = user_config_path().filter(|p| p.exists()) {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // FITLOOP_RUN__MAX_EPOCHS, FITLOOP_SNAPSHOT__PATH, ...
    figment = figment.merge(Env::prefixed("FITLOOP_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Whether a user-level or workspace-level config file exists.
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}
