//! Connection registry interface (the broadcast hub).

use async_trait::async_trait;

use super::{
    connection::Connection,
    error::PushError,
    event::StreamEvent,
    value_object::{ConnectionId, StreamId},
};

/// Tracks which connections are attached to which stream and fans events out
/// to them.
///
/// Mutations of one room are linearized. Distinct rooms proceed in parallel.
/// The viewer count of a room is always the size of its membership set.
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Register `connection` in the room of `stream_id`, creating the room if
    /// needed, then broadcast the new viewer count to every member.
    ///
    /// Returns the viewer count after the attach.
    async fn attach(&self, stream_id: &StreamId, connection: Connection) -> usize;

    /// Remove a connection. An emptied room is discarded entirely; otherwise
    /// the new viewer count is broadcast. Idempotent.
    ///
    /// Returns the viewer count after the detach.
    async fn detach(&self, stream_id: &StreamId, connection_id: ConnectionId) -> usize;

    /// Send `event` to every open connection of the room. Connections whose
    /// send fails are detached without interrupting delivery to the rest.
    ///
    /// Returns the number of connections the event was delivered to.
    async fn broadcast(&self, stream_id: &StreamId, event: StreamEvent) -> usize;

    /// Send `event` to a single connection of the room.
    async fn push_to(
        &self,
        stream_id: &StreamId,
        connection_id: ConnectionId,
        event: StreamEvent,
    ) -> Result<(), PushError>;

    /// Current member count of the room, or 0 when the room does not exist.
    async fn viewer_count(&self, stream_id: &StreamId) -> usize;

    /// Number of rooms currently held in memory.
    async fn room_count(&self) -> usize;
}
