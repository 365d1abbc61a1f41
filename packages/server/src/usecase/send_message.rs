//! UseCase: チャットメッセージ送信処理
//!
//! ライブ配信（WebSocket 経由のブロードキャスト）と永続化（HTTP 経由の保存）は
//! 独立した二つの経路で、互いにトランザクションではない。
//! どちらの経路でも、権限と入力の検証はレジストリや CMS に届く前に行う。
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - SendMessageUseCase::broadcast() / persist() メソッド
//!
//! ### どのような状況を想定しているか
//! - 正常系：chat 権限の視聴者のメッセージが全接続に届く、保存される
//! - 異常系：view-only 権限、権限不足のメッセージ種別、チャット無効、空メッセージ
//! - エッジケース：タグのみのメッセージは拒否される

use std::sync::Arc;

use crate::domain::{
    ChatMessage, CmsRepository, ConnectionRegistry, MessageContent, MessageKind, NewChatMessage,
    PermissionLevel, StreamEvent, StreamId, ViewerName, sanitizer::is_valid_message_type,
};

use super::{connect_viewer::ViewerSession, error::AppError, validate_token::TokenGrant};

const MAX_MESSAGE_ID_LEN: usize = 64;

/// Unvalidated chat input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatDraft {
    pub message: String,
    pub viewer_name: String,
    pub kind: MessageKind,
    pub message_id: Option<String>,
}

/// Parse a wire `message_type`. Absent means `regular`.
pub fn parse_message_kind(raw: Option<&str>) -> Result<MessageKind, AppError> {
    match raw {
        None => Ok(MessageKind::Regular),
        Some(raw) if is_valid_message_type(raw) => Ok(raw.parse()?),
        Some(_) => Err(AppError::Validation("Invalid message type".to_string())),
    }
}

struct ValidDraft {
    viewer_name: ViewerName,
    content: MessageContent,
    kind: MessageKind,
    message_id: Option<String>,
}

fn authorize(permission: PermissionLevel, kind: MessageKind) -> Result<(), AppError> {
    if !permission.can_chat() {
        return Err(AppError::Forbidden(
            "This access link does not allow chatting".to_string(),
        ));
    }
    if permission < kind.required_permission() {
        return Err(AppError::Forbidden(format!(
            "Only moderators may send {} messages",
            kind.as_str()
        )));
    }
    Ok(())
}

fn validate(draft: ChatDraft) -> Result<ValidDraft, AppError> {
    let viewer_name = ViewerName::new(draft.viewer_name)?;
    let content = MessageContent::new(draft.message)?;
    let message_id = match draft.message_id {
        None => None,
        Some(id) => {
            let id = id.trim().to_string();
            let well_formed = !id.is_empty()
                && id.len() <= MAX_MESSAGE_ID_LEN
                && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
            if !well_formed {
                return Err(AppError::Validation("Invalid message id".to_string()));
            }
            Some(id)
        }
    };
    Ok(ValidDraft {
        viewer_name,
        content,
        kind: draft.kind,
        message_id,
    })
}

/// メッセージ送信のユースケース
pub struct SendMessageUseCase {
    repository: Arc<dyn CmsRepository>,
    registry: Arc<dyn ConnectionRegistry>,
}

impl SendMessageUseCase {
    pub fn new(repository: Arc<dyn CmsRepository>, registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self {
            repository,
            registry,
        }
    }

    async fn chat_enabled(&self) -> Result<bool, AppError> {
        Ok(self
            .repository
            .get_stream_settings()
            .await?
            .is_none_or(|settings| settings.chat_enabled))
    }

    /// 接続中の視聴者からのメッセージをルーム全体にブロードキャストする
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - 配信できた接続数（送信者自身を含む）
    pub async fn broadcast(
        &self,
        session: &ViewerSession,
        draft: ChatDraft,
    ) -> Result<usize, AppError> {
        authorize(session.permission, draft.kind)?;
        let draft = validate(draft)?;

        // 設定が取得できない場合もライブ配信は止めない
        let enabled = self.chat_enabled().await.unwrap_or_else(|e| {
            tracing::warn!("Settings unavailable, assuming chat is enabled: {}", e);
            true
        });
        if !enabled {
            return Err(AppError::Forbidden("Chat is disabled".to_string()));
        }

        let event = StreamEvent::Chat {
            message: draft.content,
            viewer_name: draft.viewer_name,
            kind: draft.kind,
            message_id: draft.message_id,
        };
        Ok(self.registry.broadcast(&session.stream_id, event).await)
    }

    /// メッセージを CMS に保存する
    pub async fn persist(
        &self,
        grant: &TokenGrant,
        stream_id: &StreamId,
        draft: ChatDraft,
    ) -> Result<ChatMessage, AppError> {
        if &grant.stream_id != stream_id {
            return Err(AppError::Forbidden(
                "Token does not grant access to this stream".to_string(),
            ));
        }
        authorize(grant.permission, draft.kind)?;
        let draft = validate(draft)?;
        if !self.chat_enabled().await? {
            return Err(AppError::Forbidden("Chat is disabled".to_string()));
        }

        let message = self
            .repository
            .create_chat_message(NewChatMessage {
                message_id: draft.message_id,
                stream_id: stream_id.clone(),
                viewer_name: draft.viewer_name,
                content: draft.content,
                kind: draft.kind,
            })
            .await?;
        tracing::debug!("Persisted message '{}' for stream '{}'", message.id, stream_id);
        Ok(message)
    }
}
