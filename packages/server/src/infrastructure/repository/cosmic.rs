//! CMS repository backed by the Cosmic object REST API.
//!
//! Every record is a CMS object of one of four types. Reads use the bucket
//! read key as a query parameter; writes send the write key as a bearer
//! token. A 404 from a read means "nothing matched".
//!
//! `increment_access_link_usage` is read-then-write and may lose increments
//! under concurrent validation of the same token. Usage counts are telemetry.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::{Map, Value, json};

use crate::domain::{
    AccessLink, AccessToken, ChatMessage, CmsRepository, MessageContent, MessageKind,
    NewAccessLink, NewChatMessage, NewStreamSession, PermissionLevel, RepositoryError, StreamId,
    StreamSession, StreamSessionPatch, StreamSettings, StreamSettingsPatch, StreamStatus,
    ViewerName,
};

pub const DEFAULT_COSMIC_API_URL: &str = "https://api.cosmicjs.com/v3";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const OBJECT_PROPS: &str = "id,title,created_at,metadata";

const TYPE_STREAM_SESSIONS: &str = "stream-sessions";
const TYPE_ACCESS_LINKS: &str = "access-links";
const TYPE_STREAM_SETTINGS: &str = "stream-settings";
const TYPE_CHAT_MESSAGES: &str = "chat-messages";

#[derive(Debug, Clone)]
pub struct CosmicConfig {
    pub api_url: String,
    pub bucket_slug: String,
    pub read_key: String,
    /// Without a write key the repository is read-only.
    pub write_key: Option<String>,
}

pub struct CosmicCmsRepository {
    http: reqwest::Client,
    config: CosmicConfig,
}

// ========================================
// Wire format
// ========================================

#[derive(Debug, Deserialize)]
struct CosmicObject<M> {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    metadata: M,
}

#[derive(Debug, Deserialize)]
struct ObjectsResponse<M> {
    #[serde(default = "Vec::new")]
    objects: Vec<CosmicObject<M>>,
}

#[derive(Debug, Deserialize)]
struct ObjectResponse<M> {
    object: CosmicObject<M>,
}

#[derive(Debug, Deserialize)]
struct SessionMeta {
    #[serde(default, deserialize_with = "opt_string")]
    description: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    status: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    live_input_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    stream_key: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    playback_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    playback_url: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    thumbnail_url: Option<String>,
    #[serde(default, deserialize_with = "opt_datetime")]
    started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "opt_datetime")]
    ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct AccessLinkMeta {
    token: String,
    stream_id: String,
    permission: String,
    #[serde(default)]
    active: bool,
    #[serde(default, deserialize_with = "opt_datetime")]
    expiration_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "flexible_u64")]
    usage_count: u64,
    #[serde(default, deserialize_with = "opt_string")]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMeta {
    stream_id: String,
    viewer_name: String,
    message: String,
    #[serde(default, deserialize_with = "opt_string")]
    message_type: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SettingsMeta {
    #[serde(default = "default_true")]
    chat_enabled: bool,
    #[serde(default, deserialize_with = "opt_string")]
    default_permission: Option<String>,
    #[serde(default, deserialize_with = "opt_u32")]
    default_link_expiry_hours: Option<u32>,
    #[serde(default, deserialize_with = "opt_string")]
    welcome_message: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Empty strings are how the CMS reports unset text fields.
fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(d)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

fn opt_datetime<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    match opt_string(d)? {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
    }
}

/// Numbers may come back as JSON numbers or as numeric strings.
fn flexible_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom("expected a non-negative integer")),
        Value::String(s) if s.trim().is_empty() => Ok(0),
        Value::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!(
            "expected a number, got {other}"
        ))),
    }
}

fn opt_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_u64().and_then(|n| u32::try_from(n).ok())),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!(
            "expected a number, got {other}"
        ))),
    }
}

// ========================================
// Object → domain
// ========================================

fn decode_err(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(e.to_string())
}

fn unavailable(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Unavailable(e.to_string())
}

/// Decode every object of a list, skipping the ones that do not decode.
///
/// A single malformed object must not hide the rest of the list.
fn decode_each<M, T>(
    objects: Vec<CosmicObject<M>>,
    decode: impl Fn(CosmicObject<M>) -> Result<T, RepositoryError>,
) -> Vec<T> {
    objects
        .into_iter()
        .filter_map(|object| {
            let id = object.id.clone();
            match decode(object) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!("Skipping CMS object '{}': {}", id, e);
                    None
                }
            }
        })
        .collect()
}

fn session_from(object: CosmicObject<SessionMeta>) -> Result<StreamSession, RepositoryError> {
    let meta = object.metadata;
    let status = match meta.status {
        Some(raw) => raw.parse::<StreamStatus>().map_err(decode_err)?,
        None => StreamStatus::Idle,
    };
    Ok(StreamSession {
        id: StreamId::new(object.id).map_err(decode_err)?,
        title: object.title,
        description: meta.description,
        status,
        live_input_id: meta.live_input_id,
        stream_key: meta.stream_key,
        playback_id: meta.playback_id,
        playback_url: meta.playback_url,
        thumbnail_url: meta.thumbnail_url,
        created_at: object.created_at.unwrap_or_else(Utc::now),
        started_at: meta.started_at,
        ended_at: meta.ended_at,
    })
}

fn access_link_from(object: CosmicObject<AccessLinkMeta>) -> Result<AccessLink, RepositoryError> {
    let meta = object.metadata;
    Ok(AccessLink {
        id: object.id,
        token: AccessToken::parse(&meta.token).map_err(decode_err)?,
        stream_id: StreamId::new(meta.stream_id).map_err(decode_err)?,
        permission: meta.permission.parse::<PermissionLevel>().map_err(decode_err)?,
        active: meta.active,
        expiration_date: meta.expiration_date,
        usage_count: meta.usage_count,
        label: meta.label,
        created_at: object.created_at.unwrap_or_else(Utc::now),
    })
}

fn chat_message_from(object: CosmicObject<ChatMeta>) -> Result<ChatMessage, RepositoryError> {
    let meta = object.metadata;
    let kind = match meta.message_type {
        Some(raw) => raw.parse::<MessageKind>().map_err(decode_err)?,
        None => MessageKind::Regular,
    };
    Ok(ChatMessage {
        id: object.id,
        message_id: meta.message_id,
        stream_id: StreamId::new(meta.stream_id).map_err(decode_err)?,
        viewer_name: ViewerName::new(meta.viewer_name).map_err(decode_err)?,
        content: MessageContent::new(meta.message).map_err(decode_err)?,
        kind,
        created_at: object.created_at.unwrap_or_else(Utc::now),
    })
}

fn settings_from(object: CosmicObject<SettingsMeta>) -> Result<StreamSettings, RepositoryError> {
    let meta = object.metadata;
    let default_permission = match meta.default_permission {
        Some(raw) => raw.parse::<PermissionLevel>().map_err(decode_err)?,
        None => PermissionLevel::Chat,
    };
    Ok(StreamSettings {
        id: object.id,
        chat_enabled: meta.chat_enabled,
        default_permission,
        default_link_expiry_hours: meta.default_link_expiry_hours,
        welcome_message: meta.welcome_message,
    })
}

fn session_patch_body(patch: &StreamSessionPatch) -> Value {
    let mut metadata = Map::new();
    if let Some(description) = &patch.description {
        metadata.insert("description".into(), json!(description));
    }
    if let Some(status) = patch.status {
        metadata.insert("status".into(), json!(status.as_str()));
    }
    if let Some(started_at) = patch.started_at {
        metadata.insert("started_at".into(), json!(started_at.to_rfc3339()));
    }
    if let Some(ended_at) = patch.ended_at {
        metadata.insert("ended_at".into(), json!(ended_at.to_rfc3339()));
    }
    if patch.clear_live_input {
        metadata.insert("live_input_id".into(), json!(""));
        metadata.insert("stream_key".into(), json!(""));
    }

    let mut body = Map::new();
    if let Some(title) = &patch.title {
        body.insert("title".into(), json!(title));
    }
    body.insert("metadata".into(), Value::Object(metadata));
    Value::Object(body)
}

fn settings_patch_body(patch: &StreamSettingsPatch) -> Value {
    let mut metadata = Map::new();
    if let Some(chat_enabled) = patch.chat_enabled {
        metadata.insert("chat_enabled".into(), json!(chat_enabled));
    }
    if let Some(permission) = patch.default_permission {
        metadata.insert("default_permission".into(), json!(permission.as_str()));
    }
    if let Some(hours) = patch.default_link_expiry_hours {
        metadata.insert("default_link_expiry_hours".into(), json!(hours));
    }
    if let Some(message) = &patch.welcome_message {
        metadata.insert("welcome_message".into(), json!(message.trim()));
    }
    json!({ "metadata": metadata })
}

// ========================================
// HTTP plumbing
// ========================================

impl CosmicCmsRepository {
    pub fn new(config: CosmicConfig) -> Result<Self, RepositoryError> {
        if config.bucket_slug.trim().is_empty() || config.read_key.trim().is_empty() {
            return Err(RepositoryError::NotConfigured(
                "bucket slug and read key are required".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(unavailable)?;
        Ok(Self { http, config })
    }

    fn objects_url(&self) -> String {
        format!(
            "{}/buckets/{}/objects",
            self.config.api_url.trim_end_matches('/'),
            self.config.bucket_slug
        )
    }

    fn object_url(&self, id: &str) -> String {
        format!("{}/{}", self.objects_url(), id)
    }

    fn write_key(&self) -> Result<&str, RepositoryError> {
        self.config
            .write_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| RepositoryError::NotConfigured("write key is missing".to_string()))
    }

    async fn find<M: DeserializeOwned>(
        &self,
        query: Value,
        limit: Option<usize>,
        sort: Option<&str>,
    ) -> Result<Vec<CosmicObject<M>>, RepositoryError> {
        let mut params: Vec<(&str, String)> = vec![
            ("query", query.to_string()),
            ("read_key", self.config.read_key.clone()),
            ("props", OBJECT_PROPS.to_string()),
            ("depth", "0".to_string()),
        ];
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(sort) = sort {
            params.push(("sort", sort.to_string()));
        }

        let response = self
            .http
            .get(self.objects_url())
            .query(&params)
            .send()
            .await
            .map_err(unavailable)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let response = response.error_for_status().map_err(unavailable)?;
        let body: ObjectsResponse<M> = response.json().await.map_err(decode_err)?;
        Ok(body.objects)
    }

    async fn find_by_id<M: DeserializeOwned>(
        &self,
        id: &str,
    ) -> Result<Option<CosmicObject<M>>, RepositoryError> {
        let response = self
            .http
            .get(self.object_url(id))
            .query(&[
                ("read_key", self.config.read_key.as_str()),
                ("props", OBJECT_PROPS),
                ("depth", "0"),
            ])
            .send()
            .await
            .map_err(unavailable)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status().map_err(unavailable)?;
        let body: ObjectResponse<M> = response.json().await.map_err(decode_err)?;
        Ok(Some(body.object))
    }

    async fn insert<M: DeserializeOwned>(
        &self,
        object_type: &str,
        title: &str,
        metadata: Value,
    ) -> Result<CosmicObject<M>, RepositoryError> {
        let response = self
            .http
            .post(self.objects_url())
            .bearer_auth(self.write_key()?)
            .json(&json!({ "title": title, "type": object_type, "metadata": metadata }))
            .send()
            .await
            .map_err(unavailable)?
            .error_for_status()
            .map_err(unavailable)?;
        let body: ObjectResponse<M> = response.json().await.map_err(decode_err)?;
        Ok(body.object)
    }

    async fn patch<M: DeserializeOwned>(
        &self,
        id: &str,
        body: Value,
    ) -> Result<CosmicObject<M>, RepositoryError> {
        let response = self
            .http
            .patch(self.object_url(id))
            .bearer_auth(self.write_key()?)
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        let response = response.error_for_status().map_err(unavailable)?;
        let body: ObjectResponse<M> = response.json().await.map_err(decode_err)?;
        Ok(body.object)
    }
}

#[async_trait]
impl CmsRepository for CosmicCmsRepository {
    async fn list_stream_sessions(&self) -> Result<Vec<StreamSession>, RepositoryError> {
        let objects = self
            .find::<SessionMeta>(json!({ "type": TYPE_STREAM_SESSIONS }), None, Some("-created_at"))
            .await?;
        Ok(decode_each(objects, session_from))
    }

    async fn get_stream_session(
        &self,
        id: &StreamId,
    ) -> Result<Option<StreamSession>, RepositoryError> {
        self.find_by_id::<SessionMeta>(id.as_str())
            .await?
            .map(session_from)
            .transpose()
    }

    async fn create_stream_session(
        &self,
        fields: NewStreamSession,
    ) -> Result<StreamSession, RepositoryError> {
        let metadata = json!({
            "description": fields.description.unwrap_or_default(),
            "status": StreamStatus::Idle.as_str(),
            "live_input_id": fields.live_input_id,
            "stream_key": fields.stream_key,
            "playback_id": fields.playback_id.unwrap_or_default(),
            "playback_url": fields.playback_url.unwrap_or_default(),
            "thumbnail_url": fields.thumbnail_url.unwrap_or_default(),
        });
        let object = self
            .insert::<SessionMeta>(TYPE_STREAM_SESSIONS, &fields.title, metadata)
            .await?;
        session_from(object)
    }

    async fn update_stream_session(
        &self,
        id: &StreamId,
        fields: StreamSessionPatch,
    ) -> Result<StreamSession, RepositoryError> {
        let object = self
            .patch::<SessionMeta>(id.as_str(), session_patch_body(&fields))
            .await?;
        session_from(object)
    }

    async fn list_access_links(
        &self,
        stream_id: Option<StreamId>,
    ) -> Result<Vec<AccessLink>, RepositoryError> {
        let mut query = json!({ "type": TYPE_ACCESS_LINKS });
        if let Some(stream_id) = stream_id {
            query["metadata.stream_id"] = json!(stream_id.as_str());
        }
        let objects = self
            .find::<AccessLinkMeta>(query, None, Some("-created_at"))
            .await?;
        Ok(decode_each(objects, access_link_from))
    }

    async fn get_access_link_by_token(
        &self,
        token: &AccessToken,
    ) -> Result<Option<AccessLink>, RepositoryError> {
        let query = json!({
            "type": TYPE_ACCESS_LINKS,
            "metadata.token": token.as_str(),
            "metadata.active": true,
        });
        self.find::<AccessLinkMeta>(query, Some(1), None)
            .await?
            .into_iter()
            .next()
            .map(access_link_from)
            .transpose()
    }

    async fn create_access_link(
        &self,
        fields: NewAccessLink,
    ) -> Result<AccessLink, RepositoryError> {
        let title = fields
            .label
            .clone()
            .unwrap_or_else(|| format!("Access link for {}", fields.stream_id));
        let metadata = json!({
            "token": fields.token.as_str(),
            "stream_id": fields.stream_id.as_str(),
            "permission": fields.permission.as_str(),
            "active": true,
            "expiration_date": fields.expiration_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
            "usage_count": 0,
            "label": fields.label.unwrap_or_default(),
        });
        let object = self
            .insert::<AccessLinkMeta>(TYPE_ACCESS_LINKS, &title, metadata)
            .await?;
        access_link_from(object)
    }

    async fn increment_access_link_usage(&self, id: &str) -> Result<(), RepositoryError> {
        let current = self
            .find_by_id::<AccessLinkMeta>(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        let next = current.metadata.usage_count.saturating_add(1);
        self.patch::<AccessLinkMeta>(id, json!({ "metadata": { "usage_count": next } }))
            .await?;
        Ok(())
    }

    async fn get_stream_settings(&self) -> Result<Option<StreamSettings>, RepositoryError> {
        self.find::<SettingsMeta>(json!({ "type": TYPE_STREAM_SETTINGS }), Some(1), None)
            .await?
            .into_iter()
            .next()
            .map(settings_from)
            .transpose()
    }

    async fn update_stream_settings(
        &self,
        id: &str,
        fields: StreamSettingsPatch,
    ) -> Result<StreamSettings, RepositoryError> {
        let object = self
            .patch::<SettingsMeta>(id, settings_patch_body(&fields))
            .await?;
        settings_from(object)
    }

    async fn list_chat_messages(
        &self,
        stream_id: &StreamId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let query = json!({ "type": TYPE_CHAT_MESSAGES, "metadata.stream_id": stream_id.as_str() });
        let objects = self
            .find::<ChatMeta>(query, Some(limit), Some("-created_at"))
            .await?;
        let mut messages = decode_each(objects, chat_message_from);
        messages.reverse();
        Ok(messages)
    }

    async fn create_chat_message(
        &self,
        fields: NewChatMessage,
    ) -> Result<ChatMessage, RepositoryError> {
        let title = format!("{}: {}", fields.viewer_name.as_str(), fields.stream_id);
        let metadata = json!({
            "stream_id": fields.stream_id.as_str(),
            "viewer_name": fields.viewer_name.as_str(),
            "message": fields.content.as_str(),
            "message_type": fields.kind.as_str(),
            "message_id": fields.message_id.unwrap_or_default(),
        });
        let object = self
            .insert::<ChatMeta>(TYPE_CHAT_MESSAGES, &title, metadata)
            .await?;
        chat_message_from(object)
    }
}
