//! Client execution logic with reconnection support.

use std::{sync::Arc, time::Duration};

use crate::{
    api::{ChatApi, HttpChatApi},
    console::{run_console_session, spawn_readline},
    error::ClientError,
    session::{ChatSession, SessionOptions},
    transport::WsTransport,
};

const MAX_RECONNECT_ATTEMPTS: u32 = 5;
const RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Whether another attempt is worth making after `error`.
pub fn should_attempt_reconnect(error: &ClientError, attempt: u32, max_attempts: u32) -> bool {
    !error.is_fatal() && attempt < max_attempts
}

/// Consecutive failed attempts after one that ended in an error.
///
/// A session that opened before failing starts a new streak, so only
/// failures in a row count towards the limit.
pub fn failed_attempts(previous: u32, opened: bool) -> u32 {
    if opened { 1 } else { previous + 1 }
}

/// Run the chat client against `server_url`, reconnecting on connection loss.
///
/// Every reconnection opens a fresh session, so history is fetched again.
pub async fn run_client(server_url: &str, options: SessionOptions) -> Result<(), ClientError> {
    let api: Arc<dyn ChatApi> = Arc::new(HttpChatApi::new(server_url)?);
    let transport = WsTransport;
    let mut input = spawn_readline(format!("{}> ", options.viewer_name));
    let mut reconnect_count = 0;

    loop {
        tracing::info!(
            "Joining stream '{}' as '{}' (attempt {}/{})",
            options.stream_id,
            options.viewer_name,
            reconnect_count + 1,
            MAX_RECONNECT_ATTEMPTS
        );

        let (opened, result) =
            match ChatSession::open(api.clone(), &transport, options.clone()).await {
                Ok((session, inbound)) => (
                    true,
                    run_console_session(session, inbound, &options, &mut input).await,
                ),
                Err(e) => (false, Err(e)),
            };

        match result {
            Ok(()) => {
                tracing::info!("Client session ended normally");
                return Ok(());
            }
            Err(e) => {
                reconnect_count = failed_attempts(reconnect_count, opened);
                if !should_attempt_reconnect(&e, reconnect_count, MAX_RECONNECT_ATTEMPTS) {
                    return Err(e);
                }
                tracing::warn!("{}", e);
                tracing::info!(
                    "Reconnecting in {} seconds... (attempt {}/{})",
                    RECONNECT_INTERVAL.as_secs(),
                    reconnect_count + 1,
                    MAX_RECONNECT_ATTEMPTS
                );
                tokio::time::sleep(RECONNECT_INTERVAL).await;
            }
        }
    }
}
