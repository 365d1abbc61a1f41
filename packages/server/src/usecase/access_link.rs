//! UseCase: アクセスリンク管理

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use onair_shared::time::{Clock, millis_to_datetime};

use crate::domain::{
    AccessLink, AccessToken, CmsRepository, NewAccessLink, PermissionLevel, StreamId,
};

use super::error::AppError;

const MAX_LABEL_CHARS: usize = 100;

#[derive(Debug, Clone, Default)]
pub struct CreateAccessLinkCommand {
    pub stream_id: String,
    pub permission: Option<PermissionLevel>,
    pub expires_in_hours: Option<u32>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub label: Option<String>,
}

pub struct AccessLinkUseCase {
    repository: Arc<dyn CmsRepository>,
    clock: Arc<dyn Clock>,
    public_base_url: String,
}

impl AccessLinkUseCase {
    pub fn new(
        repository: Arc<dyn CmsRepository>,
        clock: Arc<dyn Clock>,
        public_base_url: String,
    ) -> Self {
        Self {
            repository,
            clock,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Viewer-facing URL that carries the token.
    pub fn share_url(&self, token: &AccessToken) -> String {
        format!("{}/watch?token={}", self.public_base_url, token.as_str())
    }

    /// Create a link for an existing stream.
    ///
    /// Permission and expiry fall back to the stream settings. An explicit
    /// `expiration_date` wins over `expires_in_hours` and must lie in the
    /// future.
    pub async fn create(&self, command: CreateAccessLinkCommand) -> Result<AccessLink, AppError> {
        let stream_id = StreamId::new(command.stream_id)?;
        if self.repository.get_stream_session(&stream_id).await?.is_none() {
            return Err(AppError::stream_not_found());
        }

        let settings = self.repository.get_stream_settings().await?.unwrap_or_default();
        let now = millis_to_datetime(self.clock.now_millis());

        let expiration_date = match (command.expiration_date, command.expires_in_hours) {
            (Some(date), _) if date <= now => {
                return Err(AppError::Validation(
                    "Expiration date must be in the future".to_string(),
                ));
            }
            (Some(date), _) => Some(date),
            (None, Some(0)) => {
                return Err(AppError::Validation(
                    "Expiry must be at least one hour".to_string(),
                ));
            }
            (None, Some(hours)) => Some(now + Duration::hours(i64::from(hours))),
            (None, None) => settings
                .default_link_expiry_hours
                .filter(|hours| *hours > 0)
                .map(|hours| now + Duration::hours(i64::from(hours))),
        };

        let label = command
            .label
            .map(|label| label.trim().chars().take(MAX_LABEL_CHARS).collect::<String>())
            .filter(|label| !label.is_empty());

        let link = self
            .repository
            .create_access_link(NewAccessLink {
                token: AccessToken::generate(),
                stream_id,
                permission: command.permission.unwrap_or(settings.default_permission),
                expiration_date,
                label,
            })
            .await?;
        tracing::info!(
            "Access link '{}' created for stream '{}' ({})",
            link.id,
            link.stream_id,
            link.permission.as_str()
        );
        Ok(link)
    }

    pub async fn list(&self, stream_id: Option<String>) -> Result<Vec<AccessLink>, AppError> {
        let stream_id = stream_id
            .filter(|id| !id.trim().is_empty())
            .map(StreamId::new)
            .transpose()?;
        Ok(self.repository.list_access_links(stream_id).await?)
    }
}
