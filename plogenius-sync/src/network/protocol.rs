//! Protocol Messages
//!
//! Wire format between the table client and the authority. Every frame is a
//! JSON text message. Inbound frames are discriminated by `type`, except
//! authority errors which arrive as a bare `error` member. Outbound frames
//! carry either `type` or, for acknowledgments, `action`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::table::actions::ActionKind;
use crate::table::snapshot::TableSnapshot;

/// Authority-assigned frame sequence number, echoed back verbatim.
///
/// The authority counts with unsigned integers; any other JSON shape is
/// still accepted and acknowledged, but cannot be ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SequenceId {
    /// Regular counter value.
    Number(u64),
    /// Anything else the authority sent (string, float, negative...).
    Other(Value),
}

impl SequenceId {
    /// Whether `self` comes strictly after `other`.
    /// `None` unless both are counter values.
    pub fn is_after(&self, other: &SequenceId) -> Option<bool> {
        match (self, other) {
            (SequenceId::Number(a), SequenceId::Number(b)) => Some(a > b),
            _ => None,
        }
    }
}

impl From<u64> for SequenceId {
    fn from(id: u64) -> Self {
        SequenceId::Number(id)
    }
}

impl std::fmt::Display for SequenceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SequenceId::Number(id) => write!(f, "#{}", id),
            SequenceId::Other(raw) => write!(f, "#{}", raw),
        }
    }
}

// =============================================================================
// CLIENT -> AUTHORITY FRAMES
// =============================================================================

/// Frames sent from the client to the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ClientFrame {
    /// Receipt acknowledgment for a snapshot or sync ping.
    Ack(AckState),
    /// A table request.
    Table(TableRequest),
}

/// `{"action": "ack_state", "id": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename = "ack_state")]
pub struct AckState {
    /// Echoed sequence identifier.
    pub id: SequenceId,
}

/// Requests that change table state on the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TableRequest {
    /// Submit a betting action.
    PlayerAction {
        /// Chosen action.
        action: ActionKind,
        /// Acting client.
        user_id: String,
        /// Table room.
        room: String,
    },
    /// Ask the authority to deal a new hand.
    StartHand {
        /// Requesting client.
        user_id: String,
        /// Table room.
        room: String,
    },
}

impl ClientFrame {
    /// Acknowledge a sequence id.
    pub fn ack(id: SequenceId) -> Self {
        Self::Ack(AckState { id })
    }

    /// Submit `action` on behalf of `user_id`.
    pub fn player_action(action: ActionKind, user_id: &str, room: &str) -> Self {
        Self::Table(TableRequest::PlayerAction {
            action,
            user_id: user_id.to_string(),
            room: room.to_string(),
        })
    }

    /// Request a new hand.
    pub fn start_hand(user_id: &str, room: &str) -> Self {
        Self::Table(TableRequest::StartHand {
            user_id: user_id.to_string(),
            room: room.to_string(),
        })
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientFrame::Ack(_) => "ack_state",
            ClientFrame::Table(TableRequest::PlayerAction { .. }) => "player_action",
            ClientFrame::Table(TableRequest::StartHand { .. }) => "start_hand",
        }
    }
}

// =============================================================================
// AUTHORITY -> CLIENT FRAMES
// =============================================================================

/// Frames sent from the authority to the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Full table snapshot.
    GameState {
        /// Replacement state.
        game_state: TableSnapshot,
        /// Sequence id to acknowledge.
        id: SequenceId,
    },

    /// Liveness ping to acknowledge.
    Sync {
        /// Sequence id to acknowledge.
        id: SequenceId,
    },

    /// Hole cards for one seat.
    PrivateHand {
        /// Seat key.
        player: String,
        /// Hole cards.
        hand: Vec<String>,
    },

    /// The client may act.
    RequestAction {
        /// Offered action identifiers.
        valid_actions: Vec<String>,
    },

    /// Authority-reported error. Arrives untagged as `{"error": ...}`.
    #[serde(skip)]
    Error {
        /// Message text.
        message: String,
    },
}

/// Inbound `type` tags this client understands.
const KNOWN_TYPES: [&str; 4] = ["game_state", "sync", "private_hand", "request_action"];

/// Inbound frame decoding errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Not valid JSON, or a known frame with the wrong shape.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Well-formed frame with a `type` we don't handle.
    #[error("unknown frame type: {0}")]
    UnknownType(String),

    /// Neither `type` nor `error` present.
    #[error("frame has no type discriminator")]
    MissingDiscriminator,
}

impl ServerFrame {
    /// Decode one inbound text frame.
    ///
    /// A known `type` wins; otherwise a bare `error` member makes an error
    /// frame; otherwise the frame is rejected.
    pub fn from_json(s: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(s)?;

        let tag = value.get("type").and_then(Value::as_str).map(str::to_owned);
        if let Some(tag) = tag.as_deref() {
            if KNOWN_TYPES.contains(&tag) {
                return Ok(serde_json::from_value(value)?);
            }
        }

        if let Some(error) = value.get("error").filter(|e| !is_falsy(e)) {
            let message = match error {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Ok(ServerFrame::Error { message });
        }

        match tag {
            Some(tag) => Err(ProtocolError::UnknownType(tag)),
            None => Err(ProtocolError::MissingDiscriminator),
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerFrame::GameState { .. } => "game_state",
            ServerFrame::Sync { .. } => "sync",
            ServerFrame::PrivateHand { .. } => "private_hand",
            ServerFrame::RequestAction { .. } => "request_action",
            ServerFrame::Error { .. } => "error",
        }
    }

    /// Sequence id this frame must be acknowledged with, if any.
    pub fn ack_id(&self) -> Option<SequenceId> {
        match self {
            ServerFrame::GameState { id, .. } | ServerFrame::Sync { id } => Some(id.clone()),
            _ => None,
        }
    }
}

/// `null`, `false` and `""` don't count as an error report.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot_json(pot: u64) -> Value {
        json!({
            "pot": pot,
            "currentPlayer": "OOP",
            "currentBet": 0,
            "oopPlayer": { "name": "OOP", "chips": 1000 },
            "ipPlayer": { "name": "IP", "chips": 1000 },
            "communityCards": [],
            "street": "preflop",
            "lastAction": "",
        })
    }

    #[test]
    fn test_ack_frame_shape() {
        let value = serde_json::to_value(ClientFrame::ack(SequenceId::from(7))).unwrap();
        assert_eq!(value, json!({ "action": "ack_state", "id": 7 }));
    }

    #[test]
    fn test_player_action_frame_shape() {
        let frame = ClientFrame::player_action(ActionKind::Call, "player42", "table1");
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            value,
            json!({ "type": "player_action", "action": "call", "user_id": "player42", "room": "table1" })
        );
        assert_eq!(frame.kind(), "player_action");
    }

    #[test]
    fn test_start_hand_frame_shape() {
        let json = ClientFrame::start_hand("player42", "table1").to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, json!({ "type": "start_hand", "user_id": "player42", "room": "table1" }));
    }

    #[test]
    fn test_parse_game_state() {
        let text = json!({ "type": "game_state", "game_state": snapshot_json(40), "id": 7 }).to_string();
        let frame = ServerFrame::from_json(&text).unwrap();

        assert_eq!(frame.ack_id(), Some(SequenceId::from(7)));
        if let ServerFrame::GameState { game_state, .. } = frame {
            assert_eq!(game_state.pot, 40);
        } else {
            panic!("Wrong frame type");
        }
    }

    #[test]
    fn test_parse_sync_and_request_action() {
        let sync = ServerFrame::from_json(r#"{"type":"sync","id":12}"#).unwrap();
        assert_eq!(sync, ServerFrame::Sync { id: SequenceId::from(12) });

        let request =
            ServerFrame::from_json(r#"{"type":"request_action","valid_actions":["fold","call"]}"#).unwrap();
        assert_eq!(request.kind(), "request_action");
        assert_eq!(request.ack_id(), None);
    }

    #[test]
    fn test_parse_private_hand() {
        let frame = ServerFrame::from_json(
            r#"{"type":"private_hand","player":"oopPlayer","hand":["Ah","Kh","Qh","Jh"]}"#,
        )
        .unwrap();
        assert_eq!(
            frame,
            ServerFrame::PrivateHand {
                player: "oopPlayer".to_string(),
                hand: vec!["Ah".into(), "Kh".into(), "Qh".into(), "Jh".into()],
            }
        );
    }

    #[test]
    fn test_parse_bare_error() {
        let frame = ServerFrame::from_json(r#"{"error":"Not your turn"}"#).unwrap();
        assert_eq!(frame, ServerFrame::Error { message: "Not your turn".to_string() });

        let structured = ServerFrame::from_json(r#"{"error":{"code":3}}"#).unwrap();
        assert_eq!(structured, ServerFrame::Error { message: r#"{"code":3}"#.to_string() });
    }

    #[test]
    fn test_non_integer_ids_echoed_verbatim() {
        let text = json!({ "type": "game_state", "game_state": snapshot_json(40), "id": "a7" }).to_string();
        let frame = ServerFrame::from_json(&text).unwrap();
        let id = frame.ack_id().unwrap();
        assert_eq!(id, SequenceId::Other(json!("a7")));

        let value = serde_json::to_value(ClientFrame::ack(id)).unwrap();
        assert_eq!(value, json!({ "action": "ack_state", "id": "a7" }));

        let sync = ServerFrame::from_json(r#"{"type":"sync","id":2.5}"#).unwrap();
        let value = serde_json::to_value(ClientFrame::ack(sync.ack_id().unwrap())).unwrap();
        assert_eq!(value, json!({ "action": "ack_state", "id": 2.5 }));
    }

    #[test]
    fn test_sequence_ordering() {
        assert_eq!(SequenceId::from(8).is_after(&SequenceId::from(7)), Some(true));
        assert_eq!(SequenceId::from(7).is_after(&SequenceId::from(7)), Some(false));
        assert_eq!(SequenceId::Other(json!("8")).is_after(&SequenceId::from(7)), None);
    }

    #[test]
    fn test_unknown_type_with_error_is_error() {
        let frame = ServerFrame::from_json(r#"{"type":"poker_action","error":"bad action"}"#).unwrap();
        assert_eq!(frame.kind(), "error");
    }

    #[test]
    fn test_rejections() {
        assert!(matches!(
            ServerFrame::from_json(r#"{"type":"chat","text":"gl"}"#),
            Err(ProtocolError::UnknownType(t)) if t == "chat"
        ));
        assert!(matches!(
            ServerFrame::from_json(r#"{"pot":10}"#),
            Err(ProtocolError::MissingDiscriminator)
        ));
        assert!(matches!(
            ServerFrame::from_json(r#"{"error":null}"#),
            Err(ProtocolError::MissingDiscriminator)
        ));
        assert!(matches!(ServerFrame::from_json("not json"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(
            ServerFrame::from_json(r#"{"type":"sync"}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }
}
