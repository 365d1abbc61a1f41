//! HTTP API request and response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{MessageKind, PermissionLevel, StreamStatus};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateStreamRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateStreamRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<StreamStatus>,
}

/// Full stream session, including the ingest key. Admin only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSessionDto {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: StreamStatus,
    pub live_input_id: Option<String>,
    pub stream_key: Option<String>,
    pub playback_id: Option<String>,
    pub playback_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Viewer-facing view of a stream session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSummaryDto {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: StreamStatus,
    pub playback_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAccessLinkRequest {
    pub stream_id: String,
    #[serde(default)]
    pub permission: Option<PermissionLevel>,
    /// Relative expiry. Ignored when `expiration_date` is set.
    #[serde(default)]
    pub expires_in_hours: Option<u32>,
    #[serde(default)]
    pub expiration_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListAccessLinksQuery {
    #[serde(default)]
    pub stream_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLinkDto {
    pub id: String,
    pub token: String,
    pub stream_id: String,
    pub permission: PermissionLevel,
    pub active: bool,
    pub expiration_date: Option<DateTime<Utc>>,
    pub usage_count: u64,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub share_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateTokenRequest {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateTokenResponse {
    pub valid: bool,
    pub permission: PermissionLevel,
    pub stream_id: String,
    pub stream: Option<StreamSummaryDto>,
    /// Where the viewer should open its live connection.
    pub ws_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatHistoryQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageDto {
    pub id: String,
    #[serde(default)]
    pub message_id: Option<String>,
    pub stream_id: String,
    pub viewer_name: String,
    pub message: String,
    pub message_type: MessageKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostChatMessageRequest {
    pub token: String,
    pub message: String,
    pub viewer_name: String,
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerCountResponse {
    pub stream_id: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoCredentialsResponse {
    pub valid: bool,
}

/// Query of the live connection endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectQuery {
    pub stream_id: String,
    pub token: String,
}
