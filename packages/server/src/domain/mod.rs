//! Domain layer.
//!
//! Value objects, entities, stream events and the interfaces the use cases
//! depend on. Concrete implementations live in the infrastructure layer.

pub mod connection;
pub mod entity;
pub mod error;
pub mod event;
pub mod rate_limit;
pub mod registry;
pub mod repository;
pub mod sanitizer;
pub mod value_object;
pub mod video;

pub use connection::{Connection, ConnectionState, PusherChannel};
pub use entity::{
    AccessLink, ChatMessage, LiveInput, LiveInputOptions, NewAccessLink, NewChatMessage,
    NewStreamSession, StreamSession, StreamSessionPatch, StreamSettings, StreamSettingsPatch,
    StreamStatus, ThumbnailOptions,
};
pub use error::{DomainError, PushError, RepositoryError, VideoError};
pub use event::StreamEvent;
pub use rate_limit::RateLimiter;
pub use registry::ConnectionRegistry;
pub use repository::CmsRepository;
pub use value_object::{
    AccessToken, ConnectionId, MessageContent, MessageKind, PermissionLevel, StreamId, ViewerName,
};
pub use video::VideoService;
