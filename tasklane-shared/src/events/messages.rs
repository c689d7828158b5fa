/// Wire messages of the real-time channel
///
/// Both directions use the same envelope: `{"event": "<name>", "data": ...}`.
///
/// Client to server:
///
/// ```json
/// {"event": "joinUser", "data": "6f1c...-uuid"}
/// {"event": "joinTaskList", "data": "0b9e...-uuid"}
/// {"event": "leaveTaskList", "data": "0b9e...-uuid"}
/// ```
///
/// Server to client: `newNotification`, `taskCreated`, `taskUpdated`,
/// `taskDeleted` and the `joined` / `left` / `error` acknowledgements.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::models::{notification::Notification, task::TaskDetail};

/// A subscription room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Room {
    /// Private room of one user
    User(Uuid),
    /// Shared room of one task list
    List(Uuid),
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::User(id) => write!(f, "user_{}", id),
            Room::List(id) => write!(f, "list_{}", id),
        }
    }
}

/// Events pushed to clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    NewNotification(Notification),
    TaskCreated(TaskDetail),
    TaskUpdated(TaskDetail),
    TaskDeleted { id: Uuid },

    /// Acknowledges a join
    Joined { room: String },
    /// Acknowledges a leave
    Left { room: String },
    /// A client message was rejected
    Error { message: String },
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::NewNotification(_) => "newNotification",
            ServerEvent::TaskCreated(_) => "taskCreated",
            ServerEvent::TaskUpdated(_) => "taskUpdated",
            ServerEvent::TaskDeleted { .. } => "taskDeleted",
            ServerEvent::Joined { .. } => "joined",
            ServerEvent::Left { .. } => "left",
            ServerEvent::Error { .. } => "error",
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    /// Serializes the event into a text frame
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Messages sent by clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    JoinUser(Uuid),
    JoinTaskList(Uuid),
    LeaveTaskList(Uuid),
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_room_names() {
        let id = Uuid::nil();
        assert_eq!(Room::User(id).to_string(), format!("user_{}", id));
        assert_eq!(Room::List(id).to_string(), format!("list_{}", id));
    }

    #[test]
    fn test_task_deleted_frame() {
        let id = Uuid::new_v4();
        let frame = ServerEvent::TaskDeleted { id }.to_frame().unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(value["event"], "taskDeleted");
        assert_eq!(value["data"]["id"], id.to_string());
    }

    #[test]
    fn test_event_names_match_wire_tags() {
        let event = ServerEvent::error("nope");
        let value: Value = serde_json::from_str(&event.to_frame().unwrap()).unwrap();
        assert_eq!(value["event"], event.name());
        assert_eq!(value["data"]["message"], "nope");
    }

    #[test]
    fn test_parse_client_messages() {
        let id = Uuid::new_v4();

        let join = json!({ "event": "joinTaskList", "data": id }).to_string();
        assert_eq!(ClientMessage::parse(&join).unwrap(), ClientMessage::JoinTaskList(id));

        let user = json!({ "event": "joinUser", "data": id }).to_string();
        assert_eq!(ClientMessage::parse(&user).unwrap(), ClientMessage::JoinUser(id));

        let leave = json!({ "event": "leaveTaskList", "data": id }).to_string();
        assert_eq!(ClientMessage::parse(&leave).unwrap(), ClientMessage::LeaveTaskList(id));
    }

    #[test]
    fn test_parse_rejects_unknown_event() {
        assert!(ClientMessage::parse(r#"{"event":"joinEverything","data":null}"#).is_err());
        assert!(ClientMessage::parse(r#"{"event":"joinTaskList","data":"not-a-uuid"}"#).is_err());
    }
}
