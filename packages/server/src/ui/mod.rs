//! HTTP and WebSocket surface of the Onair server.

mod handler;
mod server;
mod signal;
pub mod state;

pub use server::{Server, build_router};
pub use state::{AppOptions, AppState};
