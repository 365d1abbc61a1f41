//! Conversion logic between DTOs and domain entities.

use crate::domain::{AccessLink, ChatMessage, StreamEvent, StreamSession};
use crate::infrastructure::dto::{http, websocket as ws};

// ========================================
// Domain → DTO
// ========================================

impl From<StreamEvent> for ws::EventData {
    fn from(event: StreamEvent) -> Self {
        match event {
            StreamEvent::Chat {
                message,
                viewer_name,
                kind,
                message_id,
            } => ws::EventData::Chat(ws::ChatData {
                message: message.into_string(),
                viewer_name: viewer_name.into(),
                message_type: kind,
                message_id,
            }),
            StreamEvent::ViewerCount { count } => {
                ws::EventData::ViewerCount(ws::ViewerCountData { count })
            }
            StreamEvent::StreamStatus { stream_id, status } => {
                ws::EventData::StreamStatus(ws::StreamStatusData {
                    stream_id: stream_id.into_string(),
                    status,
                })
            }
            StreamEvent::System { message } => ws::EventData::System(ws::SystemData { message }),
        }
    }
}

impl ws::EventEnvelope {
    pub fn new(event: StreamEvent, timestamp: i64) -> Self {
        Self {
            event: event.into(),
            timestamp,
        }
    }
}

impl From<StreamSession> for http::StreamSessionDto {
    fn from(session: StreamSession) -> Self {
        Self {
            id: session.id.into_string(),
            title: session.title,
            description: session.description,
            status: session.status,
            live_input_id: session.live_input_id,
            stream_key: session.stream_key,
            playback_id: session.playback_id,
            playback_url: session.playback_url,
            thumbnail_url: session.thumbnail_url,
            created_at: session.created_at,
            started_at: session.started_at,
            ended_at: session.ended_at,
        }
    }
}

impl From<StreamSession> for http::StreamSummaryDto {
    fn from(session: StreamSession) -> Self {
        Self {
            id: session.id.into_string(),
            title: session.title,
            description: session.description,
            status: session.status,
            playback_url: session.playback_url,
            thumbnail_url: session.thumbnail_url,
        }
    }
}

impl From<ChatMessage> for http::ChatMessageDto {
    fn from(message: ChatMessage) -> Self {
        Self {
            id: message.id,
            message_id: message.message_id,
            stream_id: message.stream_id.into_string(),
            viewer_name: message.viewer_name.into(),
            message: message.content.into_string(),
            message_type: message.kind,
            created_at: message.created_at,
        }
    }
}

impl http::AccessLinkDto {
    pub fn from_link(link: AccessLink, share_url: String) -> Self {
        Self {
            id: link.id,
            token: link.token.into(),
            stream_id: link.stream_id.into_string(),
            permission: link.permission,
            active: link.active,
            expiration_date: link.expiration_date,
            usage_count: link.usage_count,
            label: link.label,
            created_at: link.created_at,
            share_url,
        }
    }
}
