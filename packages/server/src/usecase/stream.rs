//! UseCase: ストリームセッション管理
//!
//! ライブ入力の作成はクリティカルパスなので、動画プラットフォームの失敗は呼び出し元に返す。
//! ステータスが変わったときはルームの全接続に `StreamStatus` を配信する。

use std::sync::Arc;

use onair_shared::time::{Clock, millis_to_datetime};

use crate::domain::{
    CmsRepository, ConnectionRegistry, LiveInputOptions, NewStreamSession, StreamEvent, StreamId,
    StreamSession, StreamSessionPatch, StreamStatus, ThumbnailOptions, VideoService,
};

use super::error::AppError;

const MAX_TITLE_CHARS: usize = 200;
const THUMBNAIL: ThumbnailOptions = ThumbnailOptions {
    width: Some(640),
    height: Some(360),
    time: None,
};

#[derive(Debug, Clone, Default)]
pub struct UpdateStreamCommand {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<StreamStatus>,
}

fn validate_title(title: &str) -> Result<String, AppError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::Validation(format!(
            "Title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(title.to_string())
}

/// ストリーム管理のユースケース
pub struct StreamUseCase {
    repository: Arc<dyn CmsRepository>,
    video: Option<Arc<dyn VideoService>>,
    registry: Arc<dyn ConnectionRegistry>,
    clock: Arc<dyn Clock>,
}

impl StreamUseCase {
    pub fn new(
        repository: Arc<dyn CmsRepository>,
        video: Option<Arc<dyn VideoService>>,
        registry: Arc<dyn ConnectionRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            video,
            registry,
            clock,
        }
    }

    fn video(&self) -> Result<&Arc<dyn VideoService>, AppError> {
        self.video
            .as_ref()
            .ok_or_else(|| AppError::Configuration("Video platform is not configured".to_string()))
    }

    /// ライブ入力を作成してからセッションを保存する
    pub async fn create(
        &self,
        title: &str,
        description: Option<String>,
    ) -> Result<StreamSession, AppError> {
        let title = validate_title(title)?;
        let video = self.video()?;

        let input = video.create_live_input(LiveInputOptions::default()).await?;
        let playback_id = input.playback_ids.first().cloned();
        let fields = NewStreamSession {
            title,
            description: description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            live_input_id: input.id.clone(),
            stream_key: input.ingest_key,
            playback_url: playback_id.as_deref().map(|id| video.build_playback_url(id)),
            thumbnail_url: playback_id
                .as_deref()
                .map(|id| video.build_thumbnail_url(id, &THUMBNAIL)),
            playback_id,
        };

        match self.repository.create_stream_session(fields).await {
            Ok(session) => {
                tracing::info!("Stream '{}' created", session.id);
                Ok(session)
            }
            Err(e) => {
                // 保存に失敗したライブ入力は残さない
                if let Err(cleanup) = video.delete_live_input(&input.id).await {
                    tracing::warn!("Failed to delete orphaned live input '{}': {}", input.id, cleanup);
                }
                Err(e.into())
            }
        }
    }

    pub async fn list(&self) -> Result<Vec<StreamSession>, AppError> {
        Ok(self.repository.list_stream_sessions().await?)
    }

    pub async fn get(&self, id: &str) -> Result<StreamSession, AppError> {
        let id = StreamId::new(id.to_string())?;
        self.repository
            .get_stream_session(&id)
            .await?
            .ok_or_else(AppError::stream_not_found)
    }

    pub async fn update(
        &self,
        id: &str,
        command: UpdateStreamCommand,
    ) -> Result<StreamSession, AppError> {
        let current = self.get(id).await?;
        let now = millis_to_datetime(self.clock.now_millis());

        let mut patch = StreamSessionPatch {
            title: command.title.as_deref().map(validate_title).transpose()?,
            description: command.description.map(|d| d.trim().to_string()),
            status: command.status,
            ..Default::default()
        };
        match command.status {
            Some(StreamStatus::Live) if current.started_at.is_none() => patch.started_at = Some(now),
            Some(StreamStatus::Ended) if current.ended_at.is_none() => patch.ended_at = Some(now),
            _ => {}
        }

        let updated = self
            .repository
            .update_stream_session(&current.id, patch)
            .await?;
        if updated.status != current.status {
            self.announce_status(&updated).await;
        }
        Ok(updated)
    }

    /// 配信を終了する（ライブ入力を削除し、ステータスを ended にする）
    pub async fn end(&self, id: &str) -> Result<StreamSession, AppError> {
        let current = self.get(id).await?;
        if let Some(live_input_id) = &current.live_input_id {
            self.video()?.delete_live_input(live_input_id).await?;
        }

        let patch = StreamSessionPatch {
            status: Some(StreamStatus::Ended),
            ended_at: Some(millis_to_datetime(self.clock.now_millis())),
            clear_live_input: true,
            ..Default::default()
        };
        let updated = self
            .repository
            .update_stream_session(&current.id, patch)
            .await?;
        tracing::info!("Stream '{}' ended", updated.id);
        if updated.status != current.status {
            self.announce_status(&updated).await;
        }
        Ok(updated)
    }

    pub async fn viewer_count(&self, id: &str) -> Result<usize, AppError> {
        let id = StreamId::new(id.to_string())?;
        Ok(self.registry.viewer_count(&id).await)
    }

    pub async fn validate_video(&self) -> Result<(), AppError> {
        Ok(self.video()?.validate_credentials().await?)
    }

    async fn announce_status(&self, session: &StreamSession) {
        let delivered = self
            .registry
            .broadcast(
                &session.id,
                StreamEvent::StreamStatus {
                    stream_id: session.id.clone(),
                    status: session.status,
                },
            )
            .await;
        tracing::debug!(
            "Stream '{}' is now {} (notified {} connections)",
            session.id,
            session.status.as_str(),
            delivered
        );
    }
}
