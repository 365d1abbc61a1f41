//! Server execution logic.

use std::{future::Future, net::SocketAddr, sync::Arc};

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::infrastructure::rate_limiter::{SWEEP_INTERVAL, spawn_sweeper};

use super::{
    handler::{
        create_access_link, create_stream, end_stream, get_chat_history, get_settings,
        get_stream, get_viewer_count, health_check, list_access_links, list_streams, not_found,
        post_chat_message, update_settings, update_stream, validate_token, validate_video,
        websocket_handler,
    },
    signal::shutdown_signal,
    state::AppState,
};

/// Define the routes of the Onair API.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // WebSocket エンドポイント
        .route("/ws", get(websocket_handler))
        // HTTP エンドポイント
        .route("/api/health", get(health_check))
        .route("/api/validate-token", post(validate_token))
        .route(
            "/api/access-links",
            get(list_access_links).post(create_access_link),
        )
        .route(
            "/api/chat/{stream_id}",
            get(get_chat_history).post(post_chat_message),
        )
        .route("/api/mux/validate", get(validate_video))
        .route("/api/streams", get(list_streams).post(create_stream))
        .route(
            "/api/streams/{stream_id}",
            get(get_stream).patch(update_stream).delete(end_stream),
        )
        .route("/api/streams/{stream_id}/viewers", get(get_viewer_count))
        .route("/api/settings", get(get_settings).patch(update_settings))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Onair HTTP/WebSocket server
///
/// Owns the application state for its whole lifetime: the rate-limit sweeper
/// starts with the server and is aborted once it has shut down.
///
/// # Example
///
/// ```ignore
/// let server = Server::new(AppState::new(repository, video, clock, options));
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Bind to `host:port` and serve until Ctrl+C or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Onair server listening on {}", listener.local_addr()?);
        tracing::info!("Live connections: ws://{}/ws", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await?;
        Ok(())
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let sweeper = spawn_sweeper(self.state.rate_limiter.clone(), SWEEP_INTERVAL);
        let stopping = self.state.clone();
        let app = build_router(self.state);

        let result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown.await;
            // Open sockets would otherwise hold the graceful shutdown open.
            stopping.shutdown.send_replace(true);
        })
        .await;

        sweeper.abort();
        tracing::info!("Server shutdown complete");
        result
    }
}
