/// Real-time fanout
///
/// The hub keeps one broadcast channel per room. Rooms are either a user's
/// private room (`user_{id}`) or a list's room (`list_{id}`). Events are
/// serialized once per emit and every subscriber receives the same frame.
///
/// # Example
///
/// ```no_run
/// use tasklane_shared::events::{RealtimeHub, Room, ServerEvent};
/// use uuid::Uuid;
///
/// # async fn example() {
/// let hub = RealtimeHub::new();
/// let list_id = Uuid::new_v4();
///
/// let mut rx = hub.subscribe(Room::List(list_id)).await;
/// hub.emit(Room::List(list_id), &ServerEvent::TaskDeleted { id: Uuid::new_v4() }).await;
/// let frame = rx.recv().await.unwrap();
/// assert!(frame.contains("taskDeleted"));
/// # }
/// ```

pub mod hub;
pub mod messages;

pub use hub::{Frame, RealtimeHub, DEFAULT_ROOM_CAPACITY};
pub use messages::{ClientMessage, Room, ServerEvent};
