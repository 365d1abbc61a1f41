//! In-memory CMS repository.
//!
//! Backs the `memory` storage mode and the integration tests. Nothing
//! survives a restart.

use std::sync::Arc;

use async_trait::async_trait;
use onair_shared::time::{Clock, millis_to_datetime};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{
    AccessLink, AccessToken, ChatMessage, CmsRepository, NewAccessLink, NewChatMessage,
    NewStreamSession, RepositoryError, StreamId, StreamSession, StreamSessionPatch,
    StreamSettings, StreamSettingsPatch, StreamStatus,
};

#[derive(Default)]
struct Store {
    sessions: Vec<StreamSession>,
    access_links: Vec<AccessLink>,
    settings: Option<StreamSettings>,
    messages: Vec<ChatMessage>,
}

pub struct InMemoryCmsRepository {
    store: Mutex<Store>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCmsRepository {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Mutex::new(Store::default()),
            clock,
        }
    }

    /// Start with a settings object so that settings can be updated.
    pub fn with_default_settings(clock: Arc<dyn Clock>) -> Self {
        let store = Store {
            settings: Some(StreamSettings {
                id: "stream-settings".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        Self {
            store: Mutex::new(store),
            clock,
        }
    }

    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        millis_to_datetime(self.clock.now_millis())
    }

    fn next_id() -> String {
        Uuid::new_v4().simple().to_string()
    }
}

#[async_trait]
impl CmsRepository for InMemoryCmsRepository {
    async fn list_stream_sessions(&self) -> Result<Vec<StreamSession>, RepositoryError> {
        let store = self.store.lock().await;
        Ok(store.sessions.iter().rev().cloned().collect())
    }

    async fn get_stream_session(
        &self,
        id: &StreamId,
    ) -> Result<Option<StreamSession>, RepositoryError> {
        let store = self.store.lock().await;
        Ok(store.sessions.iter().find(|s| &s.id == id).cloned())
    }

    async fn create_stream_session(
        &self,
        fields: NewStreamSession,
    ) -> Result<StreamSession, RepositoryError> {
        let id = StreamId::new(Self::next_id())
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let session = StreamSession {
            id,
            title: fields.title,
            description: fields.description,
            status: StreamStatus::Idle,
            live_input_id: Some(fields.live_input_id),
            stream_key: Some(fields.stream_key),
            playback_id: fields.playback_id,
            playback_url: fields.playback_url,
            thumbnail_url: fields.thumbnail_url,
            created_at: self.now(),
            started_at: None,
            ended_at: None,
        };
        self.store.lock().await.sessions.push(session.clone());
        Ok(session)
    }

    async fn update_stream_session(
        &self,
        id: &StreamId,
        fields: StreamSessionPatch,
    ) -> Result<StreamSession, RepositoryError> {
        let mut store = self.store.lock().await;
        let session = store
            .sessions
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        fields.apply(session);
        Ok(session.clone())
    }

    async fn list_access_links(
        &self,
        stream_id: Option<StreamId>,
    ) -> Result<Vec<AccessLink>, RepositoryError> {
        let store = self.store.lock().await;
        Ok(store
            .access_links
            .iter()
            .rev()
            .filter(|link| stream_id.as_ref().is_none_or(|id| &link.stream_id == id))
            .cloned()
            .collect())
    }

    async fn get_access_link_by_token(
        &self,
        token: &AccessToken,
    ) -> Result<Option<AccessLink>, RepositoryError> {
        let store = self.store.lock().await;
        Ok(store
            .access_links
            .iter()
            .find(|link| link.active && &link.token == token)
            .cloned())
    }

    async fn create_access_link(
        &self,
        fields: NewAccessLink,
    ) -> Result<AccessLink, RepositoryError> {
        let link = AccessLink {
            id: Self::next_id(),
            token: fields.token,
            stream_id: fields.stream_id,
            permission: fields.permission,
            active: true,
            expiration_date: fields.expiration_date,
            usage_count: 0,
            label: fields.label,
            created_at: self.now(),
        };
        self.store.lock().await.access_links.push(link.clone());
        Ok(link)
    }

    async fn increment_access_link_usage(&self, id: &str) -> Result<(), RepositoryError> {
        let mut store = self.store.lock().await;
        let link = store
            .access_links
            .iter_mut()
            .find(|link| link.id == id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        link.usage_count += 1;
        Ok(())
    }

    async fn get_stream_settings(&self) -> Result<Option<StreamSettings>, RepositoryError> {
        Ok(self.store.lock().await.settings.clone())
    }

    async fn update_stream_settings(
        &self,
        id: &str,
        fields: StreamSettingsPatch,
    ) -> Result<StreamSettings, RepositoryError> {
        let mut store = self.store.lock().await;
        let settings = store
            .settings
            .as_mut()
            .filter(|settings| settings.id == id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        fields.apply(settings);
        Ok(settings.clone())
    }

    async fn list_chat_messages(
        &self,
        stream_id: &StreamId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let store = self.store.lock().await;
        let matching: Vec<&ChatMessage> = store
            .messages
            .iter()
            .filter(|m| &m.stream_id == stream_id)
            .collect();
        let skip = matching.len().saturating_sub(limit);
        Ok(matching.into_iter().skip(skip).cloned().collect())
    }

    async fn create_chat_message(
        &self,
        fields: NewChatMessage,
    ) -> Result<ChatMessage, RepositoryError> {
        let message = ChatMessage {
            id: Self::next_id(),
            message_id: fields.message_id,
            stream_id: fields.stream_id,
            viewer_name: fields.viewer_name,
            content: fields.content,
            kind: fields.kind,
            created_at: self.now(),
        };
        self.store.lock().await.messages.push(message.clone());
        Ok(message)
    }
}
