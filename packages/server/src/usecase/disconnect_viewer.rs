//! UseCase: 視聴者切断処理

use std::sync::Arc;

use crate::domain::ConnectionRegistry;

use super::connect_viewer::ViewerSession;

/// 視聴者切断のユースケース
pub struct DisconnectViewerUseCase {
    registry: Arc<dyn ConnectionRegistry>,
}

impl DisconnectViewerUseCase {
    pub fn new(registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// ルームから切断し、残りの視聴者数を返す
    ///
    /// 既に切り離されている接続（送信失敗による暗黙の切断など）に対しても安全に呼べる。
    pub async fn execute(&self, session: &ViewerSession) -> usize {
        let remaining = self
            .registry
            .detach(&session.stream_id, session.connection_id)
            .await;
        tracing::info!(
            "Connection '{}' left stream '{}' ({} viewers)",
            session.connection_id,
            session.stream_id,
            remaining
        );
        remaining
    }
}
