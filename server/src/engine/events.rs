use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a connected session (one per connection, not per user).
pub type SessionId = Uuid;

/// Username used for join/leave notices.
pub const SYSTEM_USERNAME: &str = "System";

/// One chat line as stored in a channel's history and replayed to new joiners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub username: String,
    pub message: String,
}

impl HistoryEntry {
    pub fn new(username: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            message: message.into(),
        }
    }

    /// A notice from the System pseudo-user.
    pub fn system(message: impl Into<String>) -> Self {
        Self::new(SYSTEM_USERNAME, message)
    }
}

/// Outbound event delivered to connections.
/// On the wire: `{"event": "<name>", "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ChatEvent {
    /// Full history replay, sent only to the joining connection.
    OlderMessages(Vec<HistoryEntry>),

    /// A chat line or a System notice.
    Message(HistoryEntry),

    /// Current membership of a channel.
    ActiveUsers {
        count: usize,
        company: String,
        users: Vec<String>,
    },

    Typing { username: String },

    StopTyping { username: String },

    /// A channel was deleted. Broadcast to every connection.
    GroupRemoved { company: String },
}

/// Inbound event sent by a client.
///
/// Missing string fields decode as empty and are rejected by validation, so a
/// malformed event never reaches the registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    Join {
        #[serde(default)]
        company: String,
        #[serde(default)]
        username: String,
    },

    SendMessage {
        #[serde(default)]
        company: String,
        #[serde(default)]
        message: String,
        #[serde(default)]
        username: String,
    },

    Typing {
        #[serde(default)]
        company: String,
        #[serde(default)]
        username: String,
    },

    StopTyping {
        #[serde(default)]
        company: String,
        #[serde(default)]
        username: String,
    },
}

impl ClientEvent {
    /// Wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Join { .. } => "join",
            ClientEvent::SendMessage { .. } => "sendMessage",
            ClientEvent::Typing { .. } => "typing",
            ClientEvent::StopTyping { .. } => "stopTyping",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outbound_wire_names_are_camel_case() {
        let events = vec![
            (ChatEvent::OlderMessages(vec![]), "olderMessages"),
            (ChatEvent::Message(HistoryEntry::new("a", "b")), "message"),
            (
                ChatEvent::ActiveUsers {
                    count: 0,
                    company: "c".into(),
                    users: vec![],
                },
                "activeUsers",
            ),
            (ChatEvent::Typing { username: "a".into() }, "typing"),
            (ChatEvent::StopTyping { username: "a".into() }, "stopTyping"),
            (
                ChatEvent::GroupRemoved {
                    company: "c".into(),
                },
                "groupRemoved",
            ),
        ];

        for (event, expected) in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["event"], expected, "wrong tag for {:?}", event);
        }
    }

    #[test]
    fn test_active_users_payload_shape() {
        let event = ChatEvent::ActiveUsers {
            count: 2,
            company: "acme".into(),
            users: vec!["alice".into(), "bob".into()],
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "event": "activeUsers",
                "data": {"count": 2, "company": "acme", "users": ["alice", "bob"]}
            })
        );
    }

    #[test]
    fn test_older_messages_is_a_plain_array() {
        let event = ChatEvent::OlderMessages(vec![HistoryEntry::new("alice", "hi")]);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "event": "olderMessages",
                "data": [{"username": "alice", "message": "hi"}]
            })
        );
    }

    #[test]
    fn test_system_entry() {
        let entry = HistoryEntry::system("alice joined the chat");
        assert_eq!(entry.username, "System");
    }

    #[test]
    fn test_parse_send_message() {
        let raw = r#"{"event":"sendMessage","data":{"company":"acme","message":"hi","username":"alice"}}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(
            event,
            ClientEvent::SendMessage {
                company: "acme".into(),
                message: "hi".into(),
                username: "alice".into(),
            }
        );
        assert_eq!(event.name(), "sendMessage");
    }

    #[test]
    fn test_parse_missing_fields_default_to_empty() {
        let raw = r#"{"event":"join","data":{"company":"acme"}}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(
            event,
            ClientEvent::Join {
                company: "acme".into(),
                username: String::new(),
            }
        );
    }

    #[test]
    fn test_parse_rejects_unknown_event_and_wrong_types() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"event":"kick","data":{}}"#).is_err());
        assert!(
            serde_json::from_str::<ClientEvent>(
                r#"{"event":"join","data":{"company":7,"username":"a"}}"#
            )
            .is_err()
        );
        assert!(serde_json::from_str::<ClientEvent>("not json").is_err());
    }
}
