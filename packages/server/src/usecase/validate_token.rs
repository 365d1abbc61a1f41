//! UseCase: アクセストークン検証
//!
//! トークンの形式を検査し、CMS のアクセスリンクから権限とストリームを解決する。
//! 成功時の利用回数の加算は投げっぱなしのタスクで行い、失敗しても呼び出し元には返さない。

use std::sync::Arc;

use onair_shared::time::{Clock, millis_to_datetime};

use crate::domain::{AccessToken, CmsRepository, PermissionLevel, StreamId};

use super::error::AppError;

/// Result of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_link_id: String,
    pub stream_id: StreamId,
    pub permission: PermissionLevel,
}

/// アクセストークン検証のユースケース
pub struct ValidateTokenUseCase {
    repository: Arc<dyn CmsRepository>,
    clock: Arc<dyn Clock>,
}

impl ValidateTokenUseCase {
    pub fn new(repository: Arc<dyn CmsRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// トークンを解決する（利用回数は加算しない）
    pub async fn resolve(&self, raw_token: &str) -> Result<TokenGrant, AppError> {
        let raw_token = raw_token.trim();
        if raw_token.is_empty() {
            return Err(AppError::Validation("Token is required".to_string()));
        }
        let token = AccessToken::parse(raw_token)?;

        let link = self
            .repository
            .get_access_link_by_token(&token)
            .await?
            .ok_or_else(AppError::invalid_token)?;

        // 有効期限は検証時点の時刻で判定する
        let now = millis_to_datetime(self.clock.now_millis());
        if !link.is_valid_at(now) {
            tracing::debug!("Access link '{}' is inactive or expired", link.id);
            return Err(AppError::invalid_token());
        }

        Ok(TokenGrant {
            access_link_id: link.id,
            stream_id: link.stream_id,
            permission: link.permission,
        })
    }

    /// トークンを検証し、利用回数の加算を非同期で行う
    pub async fn execute(&self, raw_token: &str) -> Result<TokenGrant, AppError> {
        let grant = self.resolve(raw_token).await?;

        let repository = self.repository.clone();
        let link_id = grant.access_link_id.clone();
        tokio::spawn(async move {
            if let Err(e) = repository.increment_access_link_usage(&link_id).await {
                tracing::warn!("Failed to record usage of access link '{}': {}", link_id, e);
            }
        });

        Ok(grant)
    }
}
