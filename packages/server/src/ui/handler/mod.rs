//! Request handlers.

mod error;
mod http;
mod middleware;
mod websocket;

pub use http::{
    create_access_link, create_stream, end_stream, get_chat_history, get_settings, get_stream,
    get_viewer_count, health_check, list_access_links, list_streams, not_found,
    post_chat_message, update_settings, update_stream, validate_token, validate_video,
};
pub use websocket::websocket_handler;
