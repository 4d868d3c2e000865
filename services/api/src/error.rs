//! services/api/src/error.rs
//!
//! Defines the error types for the API service: `ApiError` for startup and
//! infrastructure failures, `HumanizeError` for the user-facing humanize workflow.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use humanizer_core::{InputRejection, PortError};
use serde::Serialize;
use utoipa::ToSchema;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure while applying the embedded migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// Every failure a user can see while humanizing text.
///
/// Persistence failures after a completed job are deliberately absent: they are
/// logged and never reach the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HumanizeError {
    #[error("Please sign in to humanize text.")]
    AuthRequired,
    #[error("You have used {used} of {total} credits. Upgrade your plan to continue.")]
    QuotaExceeded { used: u32, total: u32 },
    #[error("The humanization service has run out of credits. Please try again later.")]
    RemoteCreditsExhausted,
    #[error("Text must be at least {min} characters long (got {len}).")]
    InputTooShort { min: usize, len: usize },
    #[error("Text must be at most {max} characters long (got {len}).")]
    InputTooLong { max: usize, len: usize },
    #[error("Failed to submit text for humanization: {0}")]
    SubmitFailed(String),
    #[error("Failed to check humanization status: {0}")]
    PollFailed(String),
    #[error("Humanization timed out. Please try again.")]
    TimedOut,
}

impl HumanizeError {
    /// A stable identifier for programmatic handling by clients.
    pub fn code(&self) -> &'static str {
        match self {
            HumanizeError::AuthRequired => "auth_required",
            HumanizeError::QuotaExceeded { .. } => "quota_exceeded",
            HumanizeError::RemoteCreditsExhausted => "remote_credits_exhausted",
            HumanizeError::InputTooShort { .. } => "input_too_short",
            HumanizeError::InputTooLong { .. } => "input_too_long",
            HumanizeError::SubmitFailed(_) => "submit_failed",
            HumanizeError::PollFailed(_) => "poll_failed",
            HumanizeError::TimedOut => "timed_out",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            HumanizeError::AuthRequired => StatusCode::UNAUTHORIZED,
            HumanizeError::QuotaExceeded { .. } => StatusCode::FORBIDDEN,
            HumanizeError::RemoteCreditsExhausted => StatusCode::PAYMENT_REQUIRED,
            HumanizeError::InputTooShort { .. } | HumanizeError::InputTooLong { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            HumanizeError::SubmitFailed(_) | HumanizeError::PollFailed(_) => {
                StatusCode::BAD_GATEWAY
            }
            HumanizeError::TimedOut => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Maps a failed submit call, keeping remote credit exhaustion distinct.
    pub fn from_submit(err: PortError) -> Self {
        match err {
            PortError::InsufficientCredits => HumanizeError::RemoteCreditsExhausted,
            other => HumanizeError::SubmitFailed(other.to_string()),
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

impl From<InputRejection> for HumanizeError {
    fn from(rejection: InputRejection) -> Self {
        match rejection {
            InputRejection::TooShort { min, len } => HumanizeError::InputTooShort { min, len },
            InputRejection::TooLong { max, len } => HumanizeError::InputTooLong { max, len },
        }
    }
}

/// JSON error payload returned by the humanize endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl IntoResponse for HumanizeError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
