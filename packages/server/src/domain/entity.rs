//! Domain entities stored by the CMS collaborator or returned by the video
//! platform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    error::DomainError,
    value_object::{
        AccessToken, MessageContent, MessageKind, PermissionLevel, StreamId, ViewerName,
    },
};

/// Lifecycle status of a stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    #[default]
    Idle,
    Live,
    Ended,
}

impl StreamStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamStatus::Idle => "idle",
            StreamStatus::Live => "live",
            StreamStatus::Ended => "ended",
        }
    }
}

impl std::str::FromStr for StreamStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(StreamStatus::Idle),
            "live" => Ok(StreamStatus::Live),
            "ended" => Ok(StreamStatus::Ended),
            other => Err(DomainError::InvalidStreamStatus(other.to_string())),
        }
    }
}

/// One broadcast session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSession {
    pub id: StreamId,
    pub title: String,
    pub description: Option<String>,
    pub status: StreamStatus,
    /// Live input on the video platform. Cleared once the stream ends.
    pub live_input_id: Option<String>,
    pub stream_key: Option<String>,
    pub playback_id: Option<String>,
    pub playback_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Fields for a new stream session.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStreamSession {
    pub title: String,
    pub description: Option<String>,
    pub live_input_id: String,
    pub stream_key: String,
    pub playback_id: Option<String>,
    pub playback_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

/// Partial update of a stream session. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSessionPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<StreamStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub clear_live_input: bool,
}

impl StreamSessionPatch {
    pub fn apply(&self, session: &mut StreamSession) {
        if let Some(title) = &self.title {
            session.title = title.clone();
        }
        if let Some(description) = &self.description {
            session.description = Some(description.clone());
        }
        if let Some(status) = self.status {
            session.status = status;
        }
        if let Some(started_at) = self.started_at {
            session.started_at = Some(started_at);
        }
        if let Some(ended_at) = self.ended_at {
            session.ended_at = Some(ended_at);
        }
        if self.clear_live_input {
            session.live_input_id = None;
            session.stream_key = None;
        }
    }
}

/// Token → stream grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessLink {
    pub id: String,
    pub token: AccessToken,
    pub stream_id: StreamId,
    pub permission: PermissionLevel,
    pub active: bool,
    pub expiration_date: Option<DateTime<Utc>>,
    pub usage_count: u64,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AccessLink {
    /// A link grants access iff it is active and not past its expiration.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expiration_date.is_none_or(|expires| expires > now)
    }
}

/// Fields for a new access link.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccessLink {
    pub token: AccessToken,
    pub stream_id: StreamId,
    pub permission: PermissionLevel,
    pub expiration_date: Option<DateTime<Utc>>,
    pub label: Option<String>,
}

/// A persisted chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    /// Client-generated id shared with the live broadcast of the same message.
    pub message_id: Option<String>,
    pub stream_id: StreamId,
    pub viewer_name: ViewerName,
    pub content: MessageContent,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChatMessage {
    pub message_id: Option<String>,
    pub stream_id: StreamId,
    pub viewer_name: ViewerName,
    pub content: MessageContent,
    pub kind: MessageKind,
}

/// Singleton configuration object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSettings {
    pub id: String,
    pub chat_enabled: bool,
    pub default_permission: PermissionLevel,
    pub default_link_expiry_hours: Option<u32>,
    pub welcome_message: Option<String>,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            id: String::new(),
            chat_enabled: true,
            default_permission: PermissionLevel::Chat,
            default_link_expiry_hours: None,
            welcome_message: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamSettingsPatch {
    pub chat_enabled: Option<bool>,
    pub default_permission: Option<PermissionLevel>,
    pub default_link_expiry_hours: Option<u32>,
    pub welcome_message: Option<String>,
}

impl StreamSettingsPatch {
    pub fn apply(&self, settings: &mut StreamSettings) {
        if let Some(chat_enabled) = self.chat_enabled {
            settings.chat_enabled = chat_enabled;
        }
        if let Some(permission) = self.default_permission {
            settings.default_permission = permission;
        }
        if let Some(hours) = self.default_link_expiry_hours {
            settings.default_link_expiry_hours = Some(hours);
        }
        if let Some(message) = &self.welcome_message {
            settings.welcome_message = Some(message.clone()).filter(|m| !m.trim().is_empty());
        }
    }
}

/// Options for provisioning a live input.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveInputOptions {
    pub public_playback: bool,
    pub low_latency: bool,
    pub passthrough: Option<String>,
}

impl Default for LiveInputOptions {
    fn default() -> Self {
        Self {
            public_playback: true,
            low_latency: true,
            passthrough: None,
        }
    }
}

/// A live input provisioned on the video platform.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveInput {
    pub id: String,
    pub ingest_key: String,
    pub playback_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThumbnailOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Offset into the stream, in seconds.
    pub time: Option<f64>,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn link(active: bool, expiration_date: Option<DateTime<Utc>>) -> AccessLink {
        AccessLink {
            id: "link-1".to_string(),
            token: AccessToken::generate(),
            stream_id: StreamId::new("stream-1".to_string()).unwrap(),
            permission: PermissionLevel::Chat,
            active,
            expiration_date,
            usage_count: 0,
            label: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_access_link_validity_rules() {
        // テスト項目: active かつ未失効のリンクのみ有効
        // given (前提条件):
        let now = Utc::now();

        // when / then:
        assert!(link(true, None).is_valid_at(now));
        assert!(link(true, Some(now + Duration::minutes(1))).is_valid_at(now));
        assert!(!link(true, Some(now - Duration::minutes(1))).is_valid_at(now));
        assert!(!link(true, Some(now)).is_valid_at(now));
        assert!(!link(false, None).is_valid_at(now));
    }

    #[test]
    fn test_stream_session_patch_applies_only_set_fields() {
        // テスト項目: パッチは指定されたフィールドのみ更新する
        // given (前提条件):
        let mut session = StreamSession {
            id: StreamId::new("s1".to_string()).unwrap(),
            title: "Old".to_string(),
            description: Some("desc".to_string()),
            status: StreamStatus::Idle,
            live_input_id: Some("li".to_string()),
            stream_key: Some("key".to_string()),
            playback_id: Some("pb".to_string()),
            playback_url: None,
            thumbnail_url: None,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        };
        let patch = StreamSessionPatch {
            status: Some(StreamStatus::Ended),
            clear_live_input: true,
            ..Default::default()
        };

        // when (操作):
        patch.apply(&mut session);

        // then (期待する結果):
        assert_eq!(session.title, "Old");
        assert_eq!(session.status, StreamStatus::Ended);
        assert_eq!(session.live_input_id, None);
        assert_eq!(session.stream_key, None);
        assert_eq!(session.playback_id.as_deref(), Some("pb"));
    }

    #[test]
    fn test_settings_patch_clears_blank_welcome_message() {
        let mut settings = StreamSettings {
            welcome_message: Some("hi".to_string()),
            ..Default::default()
        };
        let patch = StreamSettingsPatch {
            welcome_message: Some("   ".to_string()),
            chat_enabled: Some(false),
            ..Default::default()
        };

        patch.apply(&mut settings);

        assert_eq!(settings.welcome_message, None);
        assert!(!settings.chat_enabled);
    }

    #[test]
    fn test_stream_status_parse() {
        assert_eq!("live".parse::<StreamStatus>(), Ok(StreamStatus::Live));
        assert!("paused".parse::<StreamStatus>().is_err());
    }
}
