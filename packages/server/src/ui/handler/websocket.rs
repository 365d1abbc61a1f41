//! WebSocket connection handlers.
//!
//! One socket is one viewer attached to one stream. The registry pushes
//! serialized envelopes into the connection's channel; `pusher_loop` drains
//! it into the socket and keeps the connection alive with pings.

use std::{net::IpAddr, sync::Arc, time::Duration};

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    domain::{DomainError, MessageKind, StreamId},
    infrastructure::{
        dto::{
            http::ConnectQuery,
            websocket::{ChatData, ClientFrame},
        },
        rate_limiter::{CHAT_POLICY, TOKEN_VALIDATION_POLICY},
    },
    ui::state::AppState,
    usecase::{AppError, ChatDraft, ViewerSession},
};

use super::middleware::{ClientAddr, enforce_rate_limit};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    ClientAddr(addr): ClientAddr,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, AppError> {
    enforce_rate_limit(&state, TOKEN_VALIDATION_POLICY, addr).await?;
    let stream_id = StreamId::new(query.stream_id)?;
    let grant = state.validate_token_usecase.execute(&query.token).await?;

    // Attach before upgrading so that refusals are plain HTTP errors.
    let (tx, rx) = mpsc::unbounded_channel();
    let session = state
        .connect_viewer_usecase
        .execute(&grant, &stream_id, tx)
        .await?;

    let failed_state = state.clone();
    let failed_session = session.clone();
    Ok(ws
        .on_failed_upgrade(move |e| {
            tracing::warn!("WebSocket upgrade failed: {}", e);
            tokio::spawn(async move {
                failed_state
                    .disconnect_viewer_usecase
                    .execute(&failed_session)
                    .await;
            });
        })
        .on_upgrade(move |socket| handle_socket(socket, state, session, rx, addr)))
}

/// Drain the connection's channel into the socket, pinging when idle.
///
/// Stops when the registry drops the sender, the socket fails, or the server
/// shuts down.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: SplitSink<WebSocket, Message>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    if sender.send(Message::Text(msg.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                _ = shutdown.changed() => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    })
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    session: ViewerSession,
    rx: mpsc::UnboundedReceiver<String>,
    addr: IpAddr,
) {
    let (sender, mut receiver) = socket.split();
    let mut send_task = pusher_loop(rx, sender, state.shutdown.subscribe());

    let recv_state = state.clone();
    let recv_session = session.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::debug!("WebSocket error on '{}': {}", recv_session.connection_id, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    handle_frame(&recv_state, &recv_session, addr, text.as_str()).await;
                }
                Message::Pong(_) => {
                    tracing::trace!("Pong from '{}'", recv_session.connection_id);
                }
                Message::Close(_) => {
                    tracing::debug!("Connection '{}' requested close", recv_session.connection_id);
                    break;
                }
                _ => {}
            }
        }
    });

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    state.disconnect_viewer_usecase.execute(&session).await;
}

async fn handle_frame(state: &AppState, session: &ViewerSession, addr: IpAddr, text: &str) {
    if let Err(e) = process_frame(state, session, addr, text).await {
        tracing::debug!("Chat from '{}' refused: {}", session.connection_id, e);
        // Only the sender hears about it.
        if let Err(push_error) = state
            .connect_viewer_usecase
            .notify(session, e.to_string())
            .await
        {
            tracing::warn!("Failed to notify '{}': {}", session.connection_id, push_error);
        }
    }
}

async fn process_frame(
    state: &AppState,
    session: &ViewerSession,
    addr: IpAddr,
    text: &str,
) -> Result<usize, AppError> {
    let ClientFrame::Chat(ChatData {
        message,
        viewer_name,
        message_type,
        message_id,
    }) = serde_json::from_str::<ClientFrame>(text).map_err(|e| {
        tracing::debug!("Malformed frame from '{}': {}", session.connection_id, e);
        malformed_frame_error(text)
    })?;
    let draft = ChatDraft {
        message,
        viewer_name,
        kind: message_type,
        message_id,
    };

    enforce_rate_limit(state, CHAT_POLICY, addr).await?;
    state.send_message_usecase.broadcast(session, draft).await
}

/// Error reported back for a frame that does not parse.
fn malformed_frame_error(text: &str) -> AppError {
    let kind = serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|value| {
            value
                .pointer("/data/message_type")
                .and_then(|kind| kind.as_str())
                .map(str::to_string)
        });
    match kind {
        Some(kind) if kind.parse::<MessageKind>().is_err() => {
            DomainError::InvalidMessageKind(kind).into()
        }
        _ => AppError::Validation("Invalid chat message".to_string()),
    }
}
