//! Use case errors.
//!
//! Every failure that reaches a caller is one of these kinds. The reason
//! strings are shown to users as-is, so backend details only go to the log.

use thiserror::Error;

use crate::domain::{DomainError, RepositoryError, VideoError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// Bad input shape, length or charset.
    #[error("{0}")]
    Validation(String),

    /// Missing, malformed, inactive or expired token.
    #[error("{0}")]
    Unauthorized(String),

    #[error("Too many requests, please slow down")]
    RateLimited,

    /// CMS or video platform failure. Retryable.
    #[error("{0}")]
    BackendUnavailable(String),

    /// Missing credentials for a collaborator.
    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    NotFound(String),

    /// Authenticated, but not allowed to do this.
    #[error("{0}")]
    Forbidden(String),
}

impl AppError {
    pub fn invalid_token() -> Self {
        AppError::Unauthorized("Invalid or expired access token".to_string())
    }

    pub fn stream_not_found() -> Self {
        AppError::NotFound("Stream not found".to_string())
    }
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::InvalidTokenFormat => AppError::invalid_token(),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound(_) => AppError::NotFound("Resource not found".to_string()),
            RepositoryError::NotConfigured(detail) => {
                tracing::error!("CMS is not configured: {}", detail);
                AppError::Configuration("Storage backend is not configured".to_string())
            }
            other => {
                tracing::error!("CMS call failed: {}", other);
                AppError::BackendUnavailable("Storage backend is unavailable".to_string())
            }
        }
    }
}

impl From<VideoError> for AppError {
    fn from(e: VideoError) -> Self {
        match e {
            VideoError::NotConfigured => {
                AppError::Configuration("Video platform is not configured".to_string())
            }
            VideoError::InvalidCredentials => AppError::Configuration(
                "Video platform rejected the configured credentials".to_string(),
            ),
            other => {
                tracing::error!("Video platform call failed: {}", other);
                AppError::BackendUnavailable("Video platform is unavailable".to_string())
            }
        }
    }
}
