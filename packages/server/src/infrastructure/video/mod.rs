pub mod mux;

pub use mux::{MuxCredentials, MuxVideoService};
