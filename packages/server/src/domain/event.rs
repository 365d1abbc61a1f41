//! Events fanned out to the connections of a stream.

use super::{
    entity::StreamStatus,
    value_object::{MessageContent, MessageKind, StreamId, ViewerName},
};

/// Closed set of events a room can broadcast.
///
/// The broadcast timestamp is attached by the registry when the event is
/// sent, not when it is constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Chat {
        message: MessageContent,
        viewer_name: ViewerName,
        kind: MessageKind,
        message_id: Option<String>,
    },
    ViewerCount {
        count: usize,
    },
    StreamStatus {
        stream_id: StreamId,
        status: StreamStatus,
    },
    System {
        message: String,
    },
}

impl StreamEvent {
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Chat { .. } => "chat",
            StreamEvent::ViewerCount { .. } => "viewer_count",
            StreamEvent::StreamStatus { .. } => "stream_status",
            StreamEvent::System { .. } => "system",
        }
    }
}
