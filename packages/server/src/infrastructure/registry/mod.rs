//! Connection registry implementations.
//!
//! - `inmemory`: process-local rooms
//! - a multi-node deployment would need a pub/sub backed registry

pub mod inmemory;

pub use inmemory::InMemoryConnectionRegistry;
