//! UseCase: 視聴者接続処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ConnectViewerUseCase::execute() メソッド
//! - トークンの対象ストリームと接続先の一致確認、レジストリへの登録、ウェルカムメッセージ送信
//!
//! ### どのような状況を想定しているか
//! - 正常系：接続と視聴者数の通知
//! - 異常系：別ストリームのトークン、存在しないストリーム
//! - エッジケース：設定の取得に失敗してもウェルカムメッセージが省略されるだけで接続は成功する

use std::sync::Arc;

use crate::domain::{
    CmsRepository, Connection, ConnectionId, ConnectionRegistry, PermissionLevel, PushError,
    PusherChannel, StreamEvent, StreamId,
};

use super::{error::AppError, validate_token::TokenGrant};

/// An attached live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerSession {
    pub stream_id: StreamId,
    pub connection_id: ConnectionId,
    pub permission: PermissionLevel,
}

/// 視聴者接続のユースケース
pub struct ConnectViewerUseCase {
    repository: Arc<dyn CmsRepository>,
    registry: Arc<dyn ConnectionRegistry>,
}

impl ConnectViewerUseCase {
    pub fn new(repository: Arc<dyn CmsRepository>, registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self {
            repository,
            registry,
        }
    }

    /// 検証済みのトークンで `stream_id` のルームに接続する
    ///
    /// # Returns
    ///
    /// * `Ok(ViewerSession)` - 接続成功
    /// * `Err(AppError::Forbidden)` - トークンが別のストリーム向け
    /// * `Err(AppError::NotFound)` - ストリームが存在しない
    pub async fn execute(
        &self,
        grant: &TokenGrant,
        stream_id: &StreamId,
        sender: PusherChannel,
    ) -> Result<ViewerSession, AppError> {
        if &grant.stream_id != stream_id {
            return Err(AppError::Forbidden(
                "Token does not grant access to this stream".to_string(),
            ));
        }
        if self.repository.get_stream_session(stream_id).await?.is_none() {
            return Err(AppError::stream_not_found());
        }

        let connection = Connection::new(grant.permission, sender);
        let connection_id = connection.id();
        let count = self.registry.attach(stream_id, connection).await;
        tracing::info!(
            "Connection '{}' joined stream '{}' ({} viewers)",
            connection_id,
            stream_id,
            count
        );

        self.send_welcome(stream_id, connection_id).await;

        Ok(ViewerSession {
            stream_id: stream_id.clone(),
            connection_id,
            permission: grant.permission,
        })
    }

    /// 接続中の一人だけに `System` イベントを送る
    pub async fn notify(&self, session: &ViewerSession, message: String) -> Result<(), PushError> {
        self.registry
            .push_to(
                &session.stream_id,
                session.connection_id,
                StreamEvent::System { message },
            )
            .await
    }

    async fn send_welcome(&self, stream_id: &StreamId, connection_id: ConnectionId) {
        let welcome = match self.repository.get_stream_settings().await {
            Ok(settings) => settings.and_then(|s| s.welcome_message),
            Err(e) => {
                tracing::warn!("Skipping welcome message, settings unavailable: {}", e);
                None
            }
        };
        let Some(message) = welcome else {
            return;
        };
        if let Err(e) = self
            .registry
            .push_to(stream_id, connection_id, StreamEvent::System { message })
            .await
        {
            tracing::warn!(
                "Failed to deliver welcome message to '{}': {}",
                connection_id,
                e
            );
        }
    }
}
