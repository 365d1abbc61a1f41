//! Live side of the client: the WebSocket connection to a stream's room.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, protocol::Message},
};

use crate::error::{ClientError, reason_from_body};

/// An open live connection, seen as a pair of text channels.
///
/// `inbound` ends when the connection is lost; dropping `outbound` closes it.
pub struct LiveConnection {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
pub trait LiveTransport: Send + Sync {
    async fn connect(
        &self,
        ws_url: &str,
        stream_id: &str,
        token: &str,
    ) -> Result<LiveConnection, ClientError>;
}

/// [`LiveTransport`] over `tokio-tungstenite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsTransport;

fn connect_url(ws_url: &str, stream_id: &str, token: &str) -> Result<Url, ClientError> {
    Url::parse_with_params(ws_url, &[("stream_id", stream_id), ("token", token)])
        .map_err(|e| ClientError::ConnectionError(format!("invalid url '{ws_url}': {e}")))
}

fn handshake_error(e: tungstenite::Error) -> ClientError {
    match e {
        tungstenite::Error::Http(response) => {
            let reason = response
                .body()
                .as_deref()
                .map(reason_from_body)
                .unwrap_or_default();
            ClientError::from_status(response.status().as_u16(), reason)
        }
        other => ClientError::ConnectionError(other.to_string()),
    }
}

#[async_trait]
impl LiveTransport for WsTransport {
    async fn connect(
        &self,
        ws_url: &str,
        stream_id: &str,
        token: &str,
    ) -> Result<LiveConnection, ClientError> {
        let url = connect_url(ws_url, stream_id, token)?;
        let (ws_stream, _) = connect_async(url.as_str()).await.map_err(handshake_error)?;
        tracing::info!("Connected to stream '{}'", stream_id);

        let (mut write, mut read) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outgoing = outbound_rx.recv() => {
                        let Some(text) = outgoing else {
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        };
                        if let Err(e) = write.send(Message::Text(text.into())).await {
                            tracing::warn!("Failed to send message: {}", e);
                            break;
                        }
                    }
                    incoming = read.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            if inbound_tx.send(text.as_str().to_string()).is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::info!("Server closed the connection");
                            break;
                        }
                        Some(Err(e)) => {
                            tracing::warn!("WebSocket read error: {}", e);
                            break;
                        }
                        Some(Ok(_)) => {}
                    },
                }
            }
        });

        Ok(LiveConnection {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
