//! Infrastructure layer.
//!
//! Concrete implementations of the domain interfaces plus the wire DTOs.

pub mod dto;
pub mod rate_limiter;
pub mod registry;
pub mod repository;
pub mod video;
