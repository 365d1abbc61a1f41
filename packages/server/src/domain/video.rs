//! Video platform collaborator interface.

use async_trait::async_trait;

use super::{
    entity::{LiveInput, LiveInputOptions, ThumbnailOptions},
    error::VideoError,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoService: Send + Sync {
    /// Provision an ingest endpoint for a new stream.
    async fn create_live_input(&self, options: LiveInputOptions) -> Result<LiveInput, VideoError>;

    async fn delete_live_input(&self, id: &str) -> Result<(), VideoError>;

    fn build_playback_url(&self, playback_id: &str) -> String;

    fn build_thumbnail_url(&self, playback_id: &str, opts: &ThumbnailOptions) -> String;

    /// Succeeds when the configured credentials are accepted by the platform.
    async fn validate_credentials(&self) -> Result<(), VideoError>;
}
