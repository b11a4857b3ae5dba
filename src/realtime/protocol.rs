//! Wire messages for the realtime channel. Every frame is JSON of the
//! shape `{"type": ..., "payload": ...}` in both directions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::game::{GameStatus, Score};
use crate::models::score_event::EventType;

#[derive(Debug, Clone, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    /// Subscribe this session to a game's broadcast room.
    JoinGame { game_id: String },
    /// Unsubscribe.
    LeaveGame { game_id: String },
    /// Score mutation intent: the client sends the complete new score.
    ScoreUpdate {
        game_id: String,
        current_score: Value,
        event_type: Option<EventType>,
        event_data: Option<Value>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// Fan-out of an accepted score mutation.
    ScoreUpdated {
        game_id: String,
        current_score: Score,
        event_type: Option<EventType>,
        event_data: Option<Value>,
        actor_id: String,
        timestamp: String,
    },
    /// A session joined the broadcast room (live presence, not durable
    /// participation).
    PeerJoined { actor_id: String },
    PeerLeft { actor_id: String },
    /// A user was added to the game's participant list via room code.
    ParticipantJoined { game_id: String, actor_id: String },
    ParticipantLeft { game_id: String, actor_id: String },
    GameStatusUpdated { game_id: String, status: GameStatus },
    GameDeleted { game_id: String },
    /// Delivered to the originating session only.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_game_parses_from_typed_envelope() {
        let raw = r#"{"type":"joinGame","payload":{"gameId":"64f000000000000000000001"}}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ClientMessage::JoinGame { game_id } => {
                assert_eq!(game_id, "64f000000000000000000001")
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn score_update_carries_optional_event_fields() {
        let raw = json!({
            "type": "scoreUpdate",
            "payload": {
                "gameId": "64f000000000000000000001",
                "currentScore": { "team1": 1, "team2": 0, "half": 1 },
            },
        });
        let msg: ClientMessage = serde_json::from_value(raw).unwrap();
        match msg {
            ClientMessage::ScoreUpdate {
                event_type,
                event_data,
                ..
            } => {
                assert!(event_type.is_none());
                assert!(event_data.is_none());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn server_messages_serialize_with_type_and_payload() {
        let msg = ServerMessage::PeerJoined {
            actor_id: "64f000000000000000000002".to_string(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "peerJoined");
        assert_eq!(value["payload"]["actorId"], "64f000000000000000000002");
    }

    #[test]
    fn unknown_client_message_type_is_rejected() {
        let raw = r#"{"type":"typing","payload":{"gameId":"x"}}"#;
        assert!(serde_json::from_str::<ClientMessage>(raw).is_err());
    }
}
