//! Error types for fitloop.
//!
//! Uses `thiserror` for public API error types. Tracker misuse and wrapper
//! mismatches are programmer errors and surface as their own enums; I/O,
//! serialization and configuration failures are folded into [`FitloopError`].

use crate::progress::Field;

/// Top-level error type for the fitloop core library.
#[derive(Debug, thiserror::Error)]
pub enum FitloopError {
    #[error("Progress error: {0}")]
    Progress(#[from] ProgressError),

    #[error("Wrapper error: {0}")]
    Wrapper(#[from] WrapperError),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Snapshot error: {message}")]
    Snapshot { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by the progress trackers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProgressError {
    #[error("The '{field}' attribute is meant to be unused")]
    UnusedField { field: Field },

    #[error("'{what}' is undefined because the '{field}' counter is disabled")]
    UndefinedDerived { what: &'static str, field: Field },

    #[error("Optimizer index {index} out of range for {len} optimizer(s)")]
    OptimizerIndexOutOfRange { index: usize, len: usize },

    #[error("Progress tracks {actual} optimizer(s) but the plan configures {expected}")]
    OptimizerCountMismatch { expected: usize, actual: usize },

    #[error("Invalid fit plan: {reason}")]
    InvalidPlan { reason: String },
}

/// Errors raised while unwrapping a model from its distributed wrappers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WrapperError {
    #[error("Unexpected '{kind}' wrapper left around the model")]
    UnexpectedWrapper { kind: &'static str },
}

impl FitloopError {
    pub fn snapshot(message: impl Into<String>) -> Self {
        Self::Snapshot {
            message: message.into(),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, FitloopError>;
