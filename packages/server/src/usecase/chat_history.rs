//! UseCase: チャット履歴取得

use std::sync::Arc;

use crate::domain::{ChatMessage, CmsRepository, StreamId};

use super::error::AppError;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const MAX_HISTORY_LIMIT: usize = 200;

pub struct ChatHistoryUseCase {
    repository: Arc<dyn CmsRepository>,
}

impl ChatHistoryUseCase {
    pub fn new(repository: Arc<dyn CmsRepository>) -> Self {
        Self { repository }
    }

    /// Most recent messages of a stream, oldest first.
    pub async fn execute(
        &self,
        stream_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ChatMessage>, AppError> {
        let stream_id = StreamId::new(stream_id.to_string())?;
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);
        Ok(self.repository.list_chat_messages(&stream_id, limit).await?)
    }
}
