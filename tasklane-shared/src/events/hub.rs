/// Room registry backed by `tokio::sync::broadcast`
///
/// Each room holds one broadcast sender. Subscribing creates the room on
/// demand; emitting to a room that does not exist (or has no live receivers)
/// is a no-op. Rooms whose receivers have all dropped are removed by
/// [`RealtimeHub::prune`], which the connection handler calls on leave and
/// disconnect.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::messages::{Room, ServerEvent};

/// Buffered frames per room before slow receivers start lagging
pub const DEFAULT_ROOM_CAPACITY: usize = 256;

/// A serialized event, shared by every receiver of a room
pub type Frame = Arc<str>;

/// Process-wide room registry
#[derive(Debug)]
pub struct RealtimeHub {
    rooms: RwLock<HashMap<Room, broadcast::Sender<Frame>>>,
    capacity: usize,
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ROOM_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Subscribes to a room, creating it if needed
    pub async fn subscribe(&self, room: Room) -> broadcast::Receiver<Frame> {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Emits an event to a room
    ///
    /// # Returns
    ///
    /// Number of receivers the frame was delivered to
    pub async fn emit(&self, room: Room, event: &ServerEvent) -> usize {
        let rooms = self.rooms.read().await;
        let Some(sender) = rooms.get(&room) else {
            return 0;
        };

        let frame: Frame = match event.to_frame() {
            Ok(frame) => frame.into(),
            Err(e) => {
                tracing::error!(error = %e, event = event.name(), "Failed to serialize event");
                return 0;
            }
        };

        let delivered = sender.send(frame).unwrap_or(0);
        tracing::trace!(room = %room, event = event.name(), delivered, "Emitted event");
        delivered
    }

    pub async fn emit_to_user(&self, user_id: Uuid, event: &ServerEvent) -> usize {
        self.emit(Room::User(user_id), event).await
    }

    pub async fn emit_to_list(&self, list_id: Uuid, event: &ServerEvent) -> usize {
        self.emit(Room::List(list_id), event).await
    }

    /// Removes rooms nobody listens to
    ///
    /// # Returns
    ///
    /// Number of rooms removed
    pub async fn prune(&self) -> usize {
        let mut rooms = self.rooms.write().await;
        let before = rooms.len();
        rooms.retain(|_, sender| sender.receiver_count() > 0);
        before - rooms.len()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn subscriber_count(&self, room: Room) -> usize {
        self.rooms
            .read()
            .await
            .get(&room)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}
