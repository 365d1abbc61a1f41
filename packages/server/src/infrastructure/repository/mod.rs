//! CMS repository implementations.
//!
//! - `cosmic`: HTTP-backed object store
//! - `inmemory`: process-local store for development and tests

pub mod cosmic;
pub mod inmemory;

pub use cosmic::{CosmicCmsRepository, CosmicConfig};
pub use inmemory::InMemoryCmsRepository;
