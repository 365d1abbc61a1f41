//! UseCase: 配信設定の取得・更新

use std::sync::Arc;

use crate::domain::{CmsRepository, StreamSettings, StreamSettingsPatch};

use super::error::AppError;

const MAX_WELCOME_CHARS: usize = 500;

pub struct SettingsUseCase {
    repository: Arc<dyn CmsRepository>,
}

impl SettingsUseCase {
    pub fn new(repository: Arc<dyn CmsRepository>) -> Self {
        Self { repository }
    }

    /// Falls back to defaults when the CMS holds no settings object.
    pub async fn get(&self) -> Result<StreamSettings, AppError> {
        Ok(self.repository.get_stream_settings().await?.unwrap_or_default())
    }

    pub async fn update(&self, patch: StreamSettingsPatch) -> Result<StreamSettings, AppError> {
        if let Some(message) = &patch.welcome_message
            && message.chars().count() > MAX_WELCOME_CHARS
        {
            return Err(AppError::Validation(format!(
                "Welcome message must be at most {MAX_WELCOME_CHARS} characters"
            )));
        }
        let current = self
            .repository
            .get_stream_settings()
            .await?
            .ok_or_else(|| AppError::NotFound("Settings object does not exist".to_string()))?;
        Ok(self
            .repository
            .update_stream_settings(&current.id, patch)
            .await?)
    }
}
