//! Closed-set control-surface error codes.
//!
//! Every handler failure is wrapped into one of these variants before
//! it crosses the control surface; nothing escapes as a raw message.
//! Each carries an opaque `error_id` for log correlation — the detail
//! string stays in the log line, never in the response.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidParams,
    TaskNotFound,
    BudgetExhausted,
    AuthRequired,
    AllEnginesBlocked,
    PipelineError,
    CalibrationError,
    Timeout,
    Internal,
}

/// What the control surface returns in place of a raw error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlError {
    pub code: ErrorCode,
    pub error_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ControlError {
    pub fn new(code: ErrorCode) -> Self {
        let error_id = Uuid::new_v4();
        tracing::warn!(%error_id, ?code, "control surface returning error");
        Self {
            code,
            error_id,
            message: None,
        }
    }

    /// Attaches a detail string to the *log line only* — `message`
    /// here is for this process's own structured logs, never echoed
    /// back externally by `into_response` (see `research_engine::control`).
    pub fn with_detail(code: ErrorCode, detail: impl std::fmt::Display) -> Self {
        let error_id = Uuid::new_v4();
        tracing::warn!(%error_id, ?code, %detail, "control surface returning error");
        Self {
            code,
            error_id,
            message: None,
        }
    }
}

impl std::fmt::Display for ControlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} (error_id={})", self.code, self.error_id)
    }
}

impl std::error::Error for ControlError {}

pub type Result<T> = std::result::Result<T, ControlError>;

impl From<sqlx::Error> for ControlError {
    fn from(err: sqlx::Error) -> Self {
        ControlError::with_detail(ErrorCode::Internal, err)
    }
}

impl From<evidence_graph::error::GraphError> for ControlError {
    fn from(err: evidence_graph::error::GraphError) -> Self {
        ControlError::with_detail(ErrorCode::PipelineError, err)
    }
}

impl From<anyhow::Error> for ControlError {
    fn from(err: anyhow::Error) -> Self {
        ControlError::with_detail(ErrorCode::PipelineError, err)
    }
}

impl From<crate::store::StoreError> for ControlError {
    fn from(err: crate::store::StoreError) -> Self {
        match err {
            crate::store::StoreError::TaskNotFound(_) => {
                ControlError::with_detail(ErrorCode::TaskNotFound, err)
            }
            crate::store::StoreError::SearchNotFound(_)
            | crate::store::StoreError::AuthItemNotFound(_) => {
                ControlError::with_detail(ErrorCode::InvalidParams, err)
            }
            crate::store::StoreError::Storage(_) => {
                ControlError::with_detail(ErrorCode::Internal, err)
            }
        }
    }
}
