use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime, Document};
use serde::{Deserialize, Serialize};

/// Closed set of score-changing event kinds, shared by every game type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Score,
    Wicket,
    Goal,
    Foul,
    Timeout,
    Substitution,
    Custom,
}

/// Append-only log entry recorded for every accepted score mutation.
/// Never updated; deleted only when its game is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEvent {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub game_id: ObjectId,
    pub user_id: ObjectId,
    pub event_type: EventType,
    pub event_data: Document,
    pub timestamp: BsonDateTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEventResponse {
    pub id: String,
    pub game_id: String,
    pub user_id: String,
    pub event_type: EventType,
    pub event_data: Document,
    pub timestamp: String,
}

impl From<ScoreEvent> for ScoreEventResponse {
    fn from(event: ScoreEvent) -> Self {
        ScoreEventResponse {
            id: event.id.map(|id| id.to_hex()).unwrap_or_default(),
            game_id: event.game_id.to_hex(),
            user_id: event.user_id.to_hex(),
            event_type: event.event_type,
            event_data: event.event_data,
            timestamp: event.timestamp.to_chrono().to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_uses_lowercase_wire_names() {
        assert_eq!(
            serde_json::to_string(&EventType::Wicket).unwrap(),
            "\"wicket\""
        );
        let parsed: EventType = serde_json::from_str("\"score\"").unwrap();
        assert_eq!(parsed, EventType::Score);
    }
}
