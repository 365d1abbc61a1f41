//! Error types raised by the domain layer and its collaborators.

use thiserror::Error;

/// Value-object validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Invalid stream id: {0}")]
    InvalidStreamId(String),

    #[error("Access token has an invalid format")]
    InvalidTokenFormat,

    #[error("Viewer name must be 2-50 characters of letters, digits, spaces, '_' or '-'")]
    InvalidViewerName,

    #[error("Message is empty after sanitization")]
    EmptyMessage,

    #[error("Unknown permission level: {0}")]
    InvalidPermission(String),

    #[error("Unknown message type: {0}")]
    InvalidMessageKind(String),

    #[error("Unknown stream status: {0}")]
    InvalidStreamStatus(String),

    #[error("Connection cannot move from {from} to {to}")]
    InvalidConnectionTransition {
        from: &'static str,
        to: &'static str,
    },
}

/// Failures of the CMS collaborator.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("CMS backend is unavailable: {0}")]
    Unavailable(String),

    #[error("CMS returned an unexpected payload: {0}")]
    Decode(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("CMS is not configured: {0}")]
    NotConfigured(String),
}

/// Failures of the video platform collaborator.
#[derive(Debug, Error)]
pub enum VideoError {
    #[error("Video platform credentials are not configured")]
    NotConfigured,

    #[error("Video platform rejected the credentials")]
    InvalidCredentials,

    #[error("Video platform is unavailable: {0}")]
    Unavailable(String),

    #[error("Video platform returned an unexpected payload: {0}")]
    Decode(String),
}

/// Failures when pushing to a single live connection.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("Connection '{0}' is not attached")]
    ConnectionNotFound(String),

    #[error("Push failed: {0}")]
    PushFailed(String),
}
