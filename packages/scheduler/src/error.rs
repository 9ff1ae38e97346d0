//! Typed errors for slot admission and job execution.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("budget exhausted: {0}")]
    BudgetExhausted(String),

    #[error("job cancelled before execution")]
    Cancelled,

    #[error("domain breaker open, deferring")]
    BreakerOpen,

    #[error("job execution failed: {0}")]
    ExecutionFailed(String),

    #[error("fatal error, halting owning search: {0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
