//! Shared application state.

use std::sync::Arc;

use onair_shared::time::Clock;
use tokio::sync::watch;

use crate::{
    domain::{CmsRepository, ConnectionRegistry, RateLimiter, VideoService},
    infrastructure::{rate_limiter::FixedWindowRateLimiter, registry::InMemoryConnectionRegistry},
    usecase::{
        AccessLinkUseCase, ChatHistoryUseCase, ConnectViewerUseCase, DisconnectViewerUseCase,
        SendMessageUseCase, SettingsUseCase, StreamUseCase, ValidateTokenUseCase,
    },
};

/// Deployment options that shape the HTTP surface.
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Static bearer token for admin endpoints. `None` disables them.
    pub admin_token: Option<String>,
    /// Base of share links, e.g. `https://live.example.com`.
    pub public_base_url: String,
    /// Live connection URL advertised to viewers. Derived from
    /// `public_base_url` when absent.
    pub ws_url: Option<String>,
}

/// Shared application state
pub struct AppState {
    pub validate_token_usecase: Arc<ValidateTokenUseCase>,
    pub connect_viewer_usecase: Arc<ConnectViewerUseCase>,
    pub disconnect_viewer_usecase: Arc<DisconnectViewerUseCase>,
    pub send_message_usecase: Arc<SendMessageUseCase>,
    pub access_link_usecase: Arc<AccessLinkUseCase>,
    pub stream_usecase: Arc<StreamUseCase>,
    pub settings_usecase: Arc<SettingsUseCase>,
    pub chat_history_usecase: Arc<ChatHistoryUseCase>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub admin_token: Option<String>,
    pub ws_url: String,
    /// Flipped to `true` once the server starts shutting down; open sockets
    /// close themselves.
    pub shutdown: watch::Sender<bool>,
}

impl AppState {
    /// Wire the use cases around one process-scoped registry and limiter.
    pub fn new(
        repository: Arc<dyn CmsRepository>,
        video: Option<Arc<dyn VideoService>>,
        clock: Arc<dyn Clock>,
        options: AppOptions,
    ) -> Self {
        let registry: Arc<dyn ConnectionRegistry> =
            Arc::new(InMemoryConnectionRegistry::new(clock.clone()));
        let rate_limiter: Arc<dyn RateLimiter> =
            Arc::new(FixedWindowRateLimiter::new(clock.clone()));
        let ws_url = options
            .ws_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| derive_ws_url(&options.public_base_url));
        let (shutdown, _) = watch::channel(false);

        Self {
            validate_token_usecase: Arc::new(ValidateTokenUseCase::new(
                repository.clone(),
                clock.clone(),
            )),
            connect_viewer_usecase: Arc::new(ConnectViewerUseCase::new(
                repository.clone(),
                registry.clone(),
            )),
            disconnect_viewer_usecase: Arc::new(DisconnectViewerUseCase::new(registry.clone())),
            send_message_usecase: Arc::new(SendMessageUseCase::new(
                repository.clone(),
                registry.clone(),
            )),
            access_link_usecase: Arc::new(AccessLinkUseCase::new(
                repository.clone(),
                clock.clone(),
                options.public_base_url,
            )),
            stream_usecase: Arc::new(StreamUseCase::new(
                repository.clone(),
                video,
                registry,
                clock,
            )),
            settings_usecase: Arc::new(SettingsUseCase::new(repository.clone())),
            chat_history_usecase: Arc::new(ChatHistoryUseCase::new(repository)),
            rate_limiter,
            admin_token: options.admin_token.filter(|token| !token.is_empty()),
            ws_url,
            shutdown,
        }
    }
}

/// `https://host/base` → `wss://host/base/ws`.
fn derive_ws_url(public_base_url: &str) -> String {
    let base = public_base_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{base}/ws")
}
