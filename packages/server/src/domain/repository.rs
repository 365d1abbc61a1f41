//! CMS collaborator interface.
//!
//! The use cases depend on this trait only; the infrastructure layer provides
//! an HTTP-backed implementation and an in-memory one.
//!
//! "Not found" from the backend is never an error for lookups: list methods
//! return an empty `Vec`, single-item lookups return `None`.

use async_trait::async_trait;

use super::{
    entity::{
        AccessLink, ChatMessage, NewAccessLink, NewChatMessage, NewStreamSession, StreamSession,
        StreamSessionPatch, StreamSettings, StreamSettingsPatch,
    },
    error::RepositoryError,
    value_object::{AccessToken, StreamId},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CmsRepository: Send + Sync {
    /// Newest first.
    async fn list_stream_sessions(&self) -> Result<Vec<StreamSession>, RepositoryError>;

    async fn get_stream_session(
        &self,
        id: &StreamId,
    ) -> Result<Option<StreamSession>, RepositoryError>;

    async fn create_stream_session(
        &self,
        fields: NewStreamSession,
    ) -> Result<StreamSession, RepositoryError>;

    /// Fails with [`RepositoryError::NotFound`] when the session does not exist.
    async fn update_stream_session(
        &self,
        id: &StreamId,
        fields: StreamSessionPatch,
    ) -> Result<StreamSession, RepositoryError>;

    /// Newest first, optionally restricted to one stream.
    async fn list_access_links(
        &self,
        stream_id: Option<StreamId>,
    ) -> Result<Vec<AccessLink>, RepositoryError>;

    /// Only active links are returned.
    async fn get_access_link_by_token(
        &self,
        token: &AccessToken,
    ) -> Result<Option<AccessLink>, RepositoryError>;

    async fn create_access_link(&self, fields: NewAccessLink)
    -> Result<AccessLink, RepositoryError>;

    async fn increment_access_link_usage(&self, id: &str) -> Result<(), RepositoryError>;

    async fn get_stream_settings(&self) -> Result<Option<StreamSettings>, RepositoryError>;

    async fn update_stream_settings(
        &self,
        id: &str,
        fields: StreamSettingsPatch,
    ) -> Result<StreamSettings, RepositoryError>;

    /// The most recent `limit` messages of a stream, oldest first.
    async fn list_chat_messages(
        &self,
        stream_id: &StreamId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, RepositoryError>;

    async fn create_chat_message(
        &self,
        fields: NewChatMessage,
    ) -> Result<ChatMessage, RepositoryError>;
}
