//! In-memory connection registry.
//!
//! ## Locking
//!
//! The outer map only resolves a `StreamId` to its room; all membership
//! changes and fan-outs happen under the room's own lock, so one room's
//! operations are linearized while different rooms run in parallel. The two
//! locks are never held at the same time.
//!
//! A room that becomes empty is flagged `retired` under its lock and then
//! removed from the map. An `attach` that races with the removal sees the
//! flag and retries against a fresh room.
//!
//! Fan-out never mutates the membership set it iterates: connections whose
//! send fails are collected and detached after the pass.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use onair_shared::time::Clock;
use tokio::sync::Mutex;

use crate::{
    domain::{
        Connection, ConnectionId, ConnectionRegistry, PushError, StreamEvent, StreamId,
    },
    infrastructure::dto::websocket::EventEnvelope,
};

#[derive(Default)]
struct Room {
    connections: HashMap<ConnectionId, Connection>,
    /// Last count broadcast to the room. Always `connections.len()` once the
    /// lock is released.
    viewer_count: usize,
    retired: bool,
}

/// Process-scoped broadcast hub.
pub struct InMemoryConnectionRegistry {
    rooms: Mutex<HashMap<StreamId, Arc<Mutex<Room>>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryConnectionRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            clock,
        }
    }

    async fn room_or_create(&self, stream_id: &StreamId) -> Arc<Mutex<Room>> {
        let mut rooms = self.rooms.lock().await;
        rooms
            .entry(stream_id.clone())
            .or_insert_with(|| {
                tracing::debug!("Room '{}' created", stream_id);
                Arc::new(Mutex::new(Room::default()))
            })
            .clone()
    }

    async fn existing_room(&self, stream_id: &StreamId) -> Option<Arc<Mutex<Room>>> {
        self.rooms.lock().await.get(stream_id).cloned()
    }

    async fn discard_room(&self, stream_id: &StreamId, room: &Arc<Mutex<Room>>) {
        let mut rooms = self.rooms.lock().await;
        if rooms
            .get(stream_id)
            .is_some_and(|current| Arc::ptr_eq(current, room))
        {
            rooms.remove(stream_id);
            tracing::debug!("Room '{}' discarded", stream_id);
        }
    }

    fn encode(&self, event: StreamEvent) -> Option<String> {
        let envelope = EventEnvelope::new(event, self.clock.now_millis());
        match serde_json::to_string(&envelope) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::error!("Failed to serialize event: {}", e);
                None
            }
        }
    }

    /// Send to every member of a locked room; returns (delivered, failed).
    fn fan_out(
        &self,
        stream_id: &StreamId,
        room: &Room,
        event: StreamEvent,
    ) -> (usize, Vec<ConnectionId>) {
        let name = event.name();
        let Some(payload) = self.encode(event) else {
            return (0, Vec::new());
        };

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (id, connection) in &room.connections {
            match connection.send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        "Failed to push '{}' to connection '{}' in room '{}': {}",
                        name,
                        id,
                        stream_id,
                        e
                    );
                    failed.push(*id);
                }
            }
        }
        (delivered, failed)
    }

    fn announce_count(&self, stream_id: &StreamId, room: &mut Room) -> Vec<ConnectionId> {
        room.viewer_count = room.connections.len();
        let (_, failed) = self.fan_out(
            stream_id,
            room,
            StreamEvent::ViewerCount {
                count: room.viewer_count,
            },
        );
        failed
    }

    /// Detach `pending` and keep detaching whatever fails during the
    /// resulting viewer-count announcements.
    async fn remove_connections(
        &self,
        stream_id: &StreamId,
        mut pending: Vec<ConnectionId>,
    ) -> usize {
        loop {
            let Some(room) = self.existing_room(stream_id).await else {
                return 0;
            };
            let mut guard = room.lock().await;
            if guard.retired {
                // The room emptied out underneath us; ids are unique so none
                // of `pending` can live in a successor room.
                drop(guard);
                return self.viewer_count(stream_id).await;
            }

            let mut removed = 0;
            for id in pending.drain(..) {
                if let Some(mut connection) = guard.connections.remove(&id) {
                    connection.mark_closed();
                    removed += 1;
                    tracing::debug!("Connection '{}' detached from room '{}'", id, stream_id);
                }
            }

            if guard.connections.is_empty() {
                guard.retired = true;
                guard.viewer_count = 0;
                drop(guard);
                self.discard_room(stream_id, &room).await;
                return 0;
            }

            if removed == 0 {
                return guard.connections.len();
            }

            pending = self.announce_count(stream_id, &mut guard);
            if pending.is_empty() {
                return guard.viewer_count;
            }
        }
    }
}

#[async_trait]
impl ConnectionRegistry for InMemoryConnectionRegistry {
    async fn attach(&self, stream_id: &StreamId, mut connection: Connection) -> usize {
        let connection_id = connection.id();
        if let Err(e) = connection.mark_open() {
            tracing::warn!("Refusing to attach connection '{}': {}", connection_id, e);
            return self.viewer_count(stream_id).await;
        }

        loop {
            let room = self.room_or_create(stream_id).await;
            let mut guard = room.lock().await;
            if guard.retired {
                continue;
            }

            guard.connections.insert(connection_id, connection);
            tracing::debug!(
                "Connection '{}' attached to room '{}'",
                connection_id,
                stream_id
            );
            let failed = self.announce_count(stream_id, &mut guard);
            let count = guard.viewer_count;
            drop(guard);

            if failed.is_empty() {
                return count;
            }
            return self.remove_connections(stream_id, failed).await;
        }
    }

    async fn detach(&self, stream_id: &StreamId, connection_id: ConnectionId) -> usize {
        self.remove_connections(stream_id, vec![connection_id]).await
    }

    async fn broadcast(&self, stream_id: &StreamId, event: StreamEvent) -> usize {
        let Some(room) = self.existing_room(stream_id).await else {
            tracing::debug!("No room '{}' to broadcast to", stream_id);
            return 0;
        };

        let (delivered, failed) = {
            let guard = room.lock().await;
            if guard.retired {
                return 0;
            }
            self.fan_out(stream_id, &guard, event)
        };

        if !failed.is_empty() {
            self.remove_connections(stream_id, failed).await;
        }
        delivered
    }

    async fn push_to(
        &self,
        stream_id: &StreamId,
        connection_id: ConnectionId,
        event: StreamEvent,
    ) -> Result<(), PushError> {
        let not_found = || PushError::ConnectionNotFound(connection_id.to_string());
        let room = self.existing_room(stream_id).await.ok_or_else(not_found)?;

        let result = {
            let guard = room.lock().await;
            let connection = guard.connections.get(&connection_id).ok_or_else(not_found)?;
            let payload = self
                .encode(event)
                .ok_or_else(|| PushError::PushFailed("serialization failed".to_string()))?;
            connection.send(payload)
        };

        if result.is_err() {
            self.remove_connections(stream_id, vec![connection_id]).await;
        }
        result
    }

    async fn viewer_count(&self, stream_id: &StreamId) -> usize {
        let Some(room) = self.existing_room(stream_id).await else {
            return 0;
        };
        let guard = room.lock().await;
        if guard.retired {
            0
        } else {
            guard.connections.len()
        }
    }

    async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }
}
