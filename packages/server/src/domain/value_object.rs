//! Value objects.
//!
//! Every constructor validates its input, so a value that exists is a value
//! that is well-formed. Serde round-trips go through the same constructors.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    error::DomainError,
    sanitizer::{sanitize_message, validate_viewer_name},
};

const MAX_STREAM_ID_LEN: usize = 128;
const MIN_TOKEN_LEN: usize = 16;
const MAX_TOKEN_LEN: usize = 128;

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Opaque identifier of a stream session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StreamId(String);

impl StreamId {
    pub fn new(value: String) -> Result<Self, DomainError> {
        if value.is_empty() || value.len() > MAX_STREAM_ID_LEN || !value.chars().all(is_id_char) {
            return Err(DomainError::InvalidStreamId(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for StreamId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StreamId> for String {
    fn from(value: StreamId) -> Self {
        value.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one live connection. Unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Secret string that grants a permission level on one stream.
///
/// Only the shape is checked here; whether the token grants anything is
/// decided by the token validator.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessToken(String);

impl AccessToken {
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let value = value.trim();
        let len = value.len();
        if !(MIN_TOKEN_LEN..=MAX_TOKEN_LEN).contains(&len) || !value.chars().all(is_id_char) {
            return Err(DomainError::InvalidTokenFormat);
        }
        Ok(Self(value.to_string()))
    }

    /// 64 hex characters from two random v4 UUIDs.
    pub fn generate() -> Self {
        Self(format!(
            "{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AccessToken {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AccessToken> for String {
    fn from(value: AccessToken) -> Self {
        value.0
    }
}

// Tokens are secrets; keep them out of logs.
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tail: String = self.0.chars().skip(self.0.len().saturating_sub(4)).collect();
        write!(f, "AccessToken(…{tail})")
    }
}

/// Display name a viewer chats under. Stored trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ViewerName(String);

impl ViewerName {
    pub fn new(value: String) -> Result<Self, DomainError> {
        if !validate_viewer_name(&value) {
            return Err(DomainError::InvalidViewerName);
        }
        Ok(Self(value.trim().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ViewerName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ViewerName> for String {
    fn from(value: ViewerName) -> Self {
        value.0
    }
}

/// Sanitized, non-empty chat text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageContent(String);

impl MessageContent {
    /// Sanitize `raw` and reject it when nothing is left.
    pub fn new(raw: String) -> Result<Self, DomainError> {
        let sanitized = sanitize_message(&raw);
        if sanitized.is_empty() {
            return Err(DomainError::EmptyMessage);
        }
        Ok(Self(sanitized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for MessageContent {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MessageContent> for String {
    fn from(value: MessageContent) -> Self {
        value.0
    }
}

/// Capability tier of an access token.
///
/// Variants are declared in ascending order so that `Ord` follows capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PermissionLevel {
    #[serde(rename = "view-only")]
    ViewOnly,
    #[serde(rename = "chat")]
    Chat,
    #[serde(rename = "moderator")]
    Moderator,
}

impl PermissionLevel {
    pub fn can_chat(self) -> bool {
        self >= PermissionLevel::Chat
    }

    pub fn can_moderate(self) -> bool {
        self >= PermissionLevel::Moderator
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PermissionLevel::ViewOnly => "view-only",
            PermissionLevel::Chat => "chat",
            PermissionLevel::Moderator => "moderator",
        }
    }
}

impl std::str::FromStr for PermissionLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view-only" => Ok(PermissionLevel::ViewOnly),
            "chat" => Ok(PermissionLevel::Chat),
            "moderator" => Ok(PermissionLevel::Moderator),
            other => Err(DomainError::InvalidPermission(other.to_string())),
        }
    }
}

/// Kind of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Regular,
    System,
    Moderator,
}

impl MessageKind {
    /// Lowest permission allowed to author a message of this kind.
    pub fn required_permission(self) -> PermissionLevel {
        match self {
            MessageKind::Regular => PermissionLevel::Chat,
            MessageKind::System | MessageKind::Moderator => PermissionLevel::Moderator,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Regular => "regular",
            MessageKind::System => "system",
            MessageKind::Moderator => "moderator",
        }
    }
}

impl std::str::FromStr for MessageKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regular" => Ok(MessageKind::Regular),
            "system" => Ok(MessageKind::System),
            "moderator" => Ok(MessageKind::Moderator),
            other => Err(DomainError::InvalidMessageKind(other.to_string())),
        }
    }
}
