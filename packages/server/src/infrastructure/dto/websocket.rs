//! Live connection wire format.
//!
//! Server → client: `{"type": ..., "data": {...}, "timestamp": <ms>}`.
//! Client → server: `{"type": "chat", "data": {...}}`.

use serde::{Deserialize, Serialize};

use crate::domain::{MessageKind, StreamStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatData {
    pub message: String,
    pub viewer_name: String,
    #[serde(default)]
    pub message_type: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerCountData {
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamStatusData {
    pub stream_id: String,
    pub status: StreamStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemData {
    pub message: String,
}

/// Payload of a server-pushed event, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventData {
    Chat(ChatData),
    ViewerCount(ViewerCountData),
    StreamStatus(StreamStatusData),
    System(SystemData),
}

/// Server-pushed envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(flatten)]
    pub event: EventData,
    /// Wall-clock broadcast time (Unix milliseconds, UTC).
    pub timestamp: i64,
}

/// Frames a client may push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientFrame {
    Chat(ChatData),
}
