/// Real-time channel (WebSocket)
///
/// # Endpoint
///
/// ```text
/// GET /ws?token=<access token>
/// ```
///
/// The connection is authenticated once, at upgrade time. Afterwards the
/// client picks its rooms:
///
/// ```json
/// {"event": "joinUser", "data": "<own user id>"}
/// {"event": "joinTaskList", "data": "<list id>"}
/// {"event": "leaveTaskList", "data": "<list id>"}
/// ```
///
/// Each join or leave is acknowledged with `joined` / `left`, or refused with
/// an `error` event. Frames from every joined room are forwarded as text
/// messages.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use serde::Deserialize;
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    StreamExt as _, StreamMap,
};
use uuid::Uuid;

use tasklane_shared::auth::middleware::{authenticate_token, AuthError};
use tasklane_shared::events::{ClientMessage, Frame, Room, ServerEvent};
use tasklane_shared::models::membership::Membership;

use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// Upgrades an authenticated request to a WebSocket
///
/// # Errors
///
/// - `401 Unauthorized`: No token
/// - `403 Forbidden`: Invalid or expired token
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Result<Response, AuthError> {
    let token = query.token.ok_or(AuthError::MissingCredentials)?;
    let auth = authenticate_token(&token, &state.secrets.access)?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, auth.user_id)))
}

/// Rooms joined by one connection
struct Session {
    user_id: Uuid,
    rooms: StreamMap<Room, BroadcastStream<Frame>>,
}

impl Session {
    fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            rooms: StreamMap::new(),
        }
    }

    async fn join(&mut self, state: &AppState, room: Room) -> ServerEvent {
        if !self.rooms.contains_key(&room) {
            let rx = state.hub().subscribe(room).await;
            self.rooms.insert(room, BroadcastStream::new(rx));
        }
        ServerEvent::Joined {
            room: room.to_string(),
        }
    }

    /// Applies one client message and returns the acknowledgement
    async fn apply(&mut self, state: &AppState, message: ClientMessage) -> ServerEvent {
        match message {
            ClientMessage::JoinUser(user_id) => {
                if user_id != self.user_id {
                    return ServerEvent::error("Cannot join another user's room");
                }
                self.join(state, Room::User(user_id)).await
            }
            ClientMessage::JoinTaskList(list_id) => {
                match Membership::is_member(&state.db, list_id, self.user_id).await {
                    Ok(true) => self.join(state, Room::List(list_id)).await,
                    Ok(false) => ServerEvent::error("Not a member of this task list"),
                    Err(e) => {
                        tracing::error!(error = %e, list_id = %list_id, "Membership check failed");
                        ServerEvent::error("Could not join task list")
                    }
                }
            }
            ClientMessage::LeaveTaskList(list_id) => {
                let room = Room::List(list_id);
                if self.rooms.remove(&room).is_some() {
                    state.hub().prune().await;
                }
                ServerEvent::Left {
                    room: room.to_string(),
                }
            }
        }
    }
}

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> bool {
    match event.to_frame() {
        Ok(frame) => socket.send(Message::Text(frame)).await.is_ok(),
        Err(e) => {
            tracing::error!(error = %e, event = event.name(), "Failed to serialize event");
            true
        }
    }
}

async fn handle_socket(mut socket: WebSocket, state: AppState, user_id: Uuid) {
    let mut session = Session::new(user_id);
    tracing::debug!(user_id = %user_id, "WebSocket connected");

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };

                let reply = match ClientMessage::parse(&text) {
                    Ok(message) => session.apply(&state, message).await,
                    Err(_) => ServerEvent::error("Unrecognized message"),
                };
                if !send_event(&mut socket, &reply).await {
                    break;
                }
            }
            Some((room, frame)) = session.rooms.next(), if !session.rooms.is_empty() => {
                match frame {
                    Ok(frame) => {
                        if socket.send(Message::Text(frame.to_string())).await.is_err() {
                            break;
                        }
                    }
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        tracing::warn!(user_id = %user_id, room = %room, skipped, "Client lagging, events dropped");
                    }
                }
            }
        }
    }

    drop(session);
    state.hub().prune().await;
    tracing::debug!(user_id = %user_id, "WebSocket disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_state;

    #[tokio::test]
    async fn test_join_own_room_only() {
        let state = test_state(false);
        let me = Uuid::new_v4();
        let mut session = Session::new(me);

        let refused = session.apply(&state, ClientMessage::JoinUser(Uuid::new_v4())).await;
        assert!(matches!(refused, ServerEvent::Error { .. }));
        assert!(session.rooms.is_empty());

        let joined = session.apply(&state, ClientMessage::JoinUser(me)).await;
        assert!(matches!(joined, ServerEvent::Joined { ref room } if *room == format!("user_{}", me)));
        assert_eq!(state.hub().subscriber_count(Room::User(me)).await, 1);

        // Joining twice keeps a single subscription
        session.apply(&state, ClientMessage::JoinUser(me)).await;
        assert_eq!(state.hub().subscriber_count(Room::User(me)).await, 1);
    }

    #[tokio::test]
    async fn test_events_reach_joined_session() {
        let state = test_state(false);
        let me = Uuid::new_v4();
        let mut session = Session::new(me);
        session.apply(&state, ClientMessage::JoinUser(me)).await;

        let task_id = Uuid::new_v4();
        state
            .hub()
            .emit_to_user(me, &ServerEvent::TaskDeleted { id: task_id })
            .await;

        let (room, frame) = session.rooms.next().await.unwrap();
        assert_eq!(room, Room::User(me));
        assert!(frame.unwrap().contains(&task_id.to_string()));
    }

    #[tokio::test]
    async fn test_leave_prunes_room() {
        let state = test_state(false);
        let list_id = Uuid::new_v4();
        let mut session = Session::new(Uuid::new_v4());

        // Simulate a joined list room without the membership query
        session.join(&state, Room::List(list_id)).await;
        assert_eq!(state.hub().room_count().await, 1);

        let left = session.apply(&state, ClientMessage::LeaveTaskList(list_id)).await;
        assert!(matches!(left, ServerEvent::Left { .. }));
        assert_eq!(state.hub().room_count().await, 0);
    }
}
