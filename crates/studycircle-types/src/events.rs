use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Message, Notification};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Identify accepted; `group_ids` lists the groups open to Subscribe
    Ready { user_id: Uuid, group_ids: Vec<Uuid> },

    /// Result of a Subscribe command: groups joined and groups refused
    SubscribeAck {
        subscribed: Vec<Uuid>,
        rejected: Vec<Uuid>,
    },

    /// A chat message was appended to a group
    MessageCreate { message: Message },

    /// A notification was created for the receiving user
    NotificationCreate { notification: Notification },
}

impl GatewayEvent {
    /// Returns the group_id if this event is scoped to a study group topic.
    pub fn group_id(&self) -> Option<Uuid> {
        match self {
            Self::MessageCreate { message } => Some(message.group_id),
            _ => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Start receiving chat messages for these groups
    Subscribe { group_ids: Vec<Uuid> },

    /// Stop receiving chat messages for these groups
    Unsubscribe { group_ids: Vec<Uuid> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_format() {
        let raw = r#"{"type":"Subscribe","data":{"group_ids":["00000000-0000-0000-0000-000000000001"]}}"#;
        match serde_json::from_str::<GatewayCommand>(raw).unwrap() {
            GatewayCommand::Subscribe { group_ids } => assert_eq!(group_ids.len(), 1),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_ready_has_no_group_scope() {
        let event = GatewayEvent::Ready {
            user_id: Uuid::nil(),
            group_ids: vec![],
        };
        assert_eq!(event.group_id(), None);
    }
}
