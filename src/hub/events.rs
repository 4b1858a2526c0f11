use serde::{Deserialize, Serialize};
use warp::ws::Message;

use crate::error::Result;

/// Events a client may send over the hub WebSocket.
///
/// Anything that fails to parse into one of these is dropped without a
/// reply; the hub is fire-and-forget and has no response channel for
/// malformed input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinRoom {
        room: String,
    },

    CodeChange {
        room: String,
        code: String,
    },

    SendMessage {
        room: String,
        sender: String,
        message: String,
    },

    SignalWarning {
        room: String,
    },
}

/// Events the hub fans out to room members.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// New code buffer. `from` is the sending connection; it is absent
    /// on the initial-state snapshot delivered to a fresh joiner.
    CodeUpdate {
        code: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        from: Option<String>,
    },

    /// Chat line, echoed to every member including the sender. `ts` is
    /// assigned server-side at fan-out so all recipients agree on it.
    ReceiveMessage {
        sender: String,
        message: String,
        from: String,
        ts: u64,
    },

    /// Attention-lost signal. Carries no text; wording is up to the UI.
    ReceiveWarning {
        from: String,
    },
}

impl ServerEvent {
    pub fn to_message(&self) -> Result<Message> {
        Ok(Message::text(serde_json::to_string(self)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_join_room() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"join-room","room":"r1"}"#).unwrap();
        assert!(matches!(event, ClientEvent::JoinRoom { room } if room == "r1"));
    }

    #[test]
    fn test_parse_code_change() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"code-change","room":"r1","code":"x=1"}"#).unwrap();
        match event {
            ClientEvent::CodeChange { room, code } => {
                assert_eq!(room, "r1");
                assert_eq!(code, "x=1");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_parse_send_message() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"type":"send-message","room":"r1","sender":"Ada","message":"hi"}"#,
        )
        .unwrap();
        assert!(matches!(event, ClientEvent::SendMessage { .. }));
    }

    #[test]
    fn test_unknown_event_rejected() {
        let result: std::result::Result<ClientEvent, _> =
            serde_json::from_str(r#"{"type":"self-destruct","room":"r1"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_code_update_omits_absent_sender() {
        let event = ServerEvent::CodeUpdate {
            code: "x=1".to_string(),
            from: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"code-update","code":"x=1"}"#);
    }

    #[test]
    fn test_receive_message_wire_shape() {
        let event = ServerEvent::ReceiveMessage {
            sender: "Ada".to_string(),
            message: "hi".to_string(),
            from: "conn1".to_string(),
            ts: 1700000000000,
        };
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(value["type"], "receive-message");
        assert_eq!(value["sender"], "Ada");
        assert_eq!(value["ts"], 1700000000000u64);
    }
}
