//! Viewer chat client for Onair live streams.
//!
//! [`ChatSession`] holds one viewer's view of a stream's chat. It talks to
//! the server through the [`ChatApi`] (HTTP) and [`LiveTransport`]
//! (WebSocket) seams; [`run_client`] wires both to an interactive console.

pub mod api;
mod console;
pub mod error;
mod formatter;
mod runner;
pub mod session;
pub mod transport;
mod ui;

pub use api::{ChatApi, HttpChatApi};
pub use error::ClientError;
pub use runner::run_client;
pub use session::{
    ChatEntry, ChatSession, DEFAULT_HISTORY_LIMIT, SentMessage, SessionOptions, SessionUpdate,
};
pub use transport::{LiveConnection, LiveTransport, WsTransport};
