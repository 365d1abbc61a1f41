//! Utilities shared between the Onair server and client.

pub mod logger;
pub mod time;
