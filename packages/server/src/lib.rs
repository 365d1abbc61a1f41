//! Live-stream chat and presence server.
//!
//! Token-gated viewers attach to a per-stream room over WebSocket; chat,
//! viewer counts and stream status are fanned out to every connection of the
//! room. Streams, access links, settings and chat history live in a headless
//! CMS; live inputs live on the video platform.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
