use thiserror::Error;

use crate::ports::StoreError;

/// Errors that abort an orchestrator run.
///
/// Per-task failures (malformed rules, rejected writes, failed deliveries) never
/// surface here; they are logged and counted in the run report. Config and rule
/// validation keep their own error types (`ConfigError`, `RuleError`).
#[derive(Debug, Error)]
pub enum RecurError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, RecurError>;
