//! Use case layer.
//!
//! Orchestrates the domain interfaces. Validation and authorization happen
//! here, before anything reaches the connection registry or the CMS.

mod access_link;
mod chat_history;
mod connect_viewer;
mod disconnect_viewer;
pub mod error;
mod send_message;
mod settings;
mod stream;
mod validate_token;

pub use access_link::{AccessLinkUseCase, CreateAccessLinkCommand};
pub use chat_history::{ChatHistoryUseCase, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT};
pub use connect_viewer::{ConnectViewerUseCase, ViewerSession};
pub use disconnect_viewer::DisconnectViewerUseCase;
pub use error::AppError;
pub use send_message::{ChatDraft, SendMessageUseCase, parse_message_kind};
pub use settings::SettingsUseCase;
pub use stream::{StreamUseCase, UpdateStreamCommand};
pub use validate_token::{TokenGrant, ValidateTokenUseCase};
