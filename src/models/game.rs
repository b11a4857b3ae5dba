use std::fmt;

use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime, Document};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::errors::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    Cricket,
    Football,
    Basketball,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Waiting,
    Live,
    Completed,
    Cancelled,
}

impl GameStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, GameStatus::Completed | GameStatus::Cancelled)
    }

    /// Legal transitions: waiting -> live, waiting -> cancelled,
    /// live -> completed, live -> cancelled. Everything else is rejected.
    pub fn can_transition_to(self, next: GameStatus) -> bool {
        matches!(
            (self, next),
            (GameStatus::Waiting, GameStatus::Live)
                | (GameStatus::Waiting, GameStatus::Cancelled)
                | (GameStatus::Live, GameStatus::Completed)
                | (GameStatus::Live, GameStatus::Cancelled)
        )
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GameStatus::Waiting => "waiting",
            GameStatus::Live => "live",
            GameStatus::Completed => "completed",
            GameStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Creator,
    Scorer,
    Viewer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: ObjectId,
    pub role: Role,
    pub joined_at: BsonDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CricketInnings {
    pub runs: u32,
    pub wickets: u8,
    pub overs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CricketScore {
    pub team1: CricketInnings,
    pub team2: CricketInnings,
    pub current_innings: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BasketballScore {
    pub team1: u32,
    pub team2: u32,
    pub quarter: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FootballScore {
    pub team1: u32,
    pub team2: u32,
    pub half: u32,
}

/// Current score, shaped by game type. Stored untagged so the documents
/// keep the original wire shape; `validate_for` is the only way a
/// client-supplied value becomes a `Score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Score {
    Cricket(CricketScore),
    Basketball(BasketballScore),
    Football(FootballScore),
    Custom(Document),
}

impl Score {
    pub fn initial(game_type: GameType) -> Score {
        match game_type {
            GameType::Cricket => Score::Cricket(CricketScore {
                team1: CricketInnings { runs: 0, wickets: 0, overs: 0.0 },
                team2: CricketInnings { runs: 0, wickets: 0, overs: 0.0 },
                current_innings: 1,
            }),
            GameType::Basketball => Score::Basketball(BasketballScore {
                team1: 0,
                team2: 0,
                quarter: 1,
            }),
            GameType::Football => Score::Football(FootballScore {
                team1: 0,
                team2: 0,
                half: 1,
            }),
            GameType::Custom => Score::Custom(Document::new()),
        }
    }

    /// Validates a client-supplied full score replacement against the
    /// game's declared type. Clients send the complete new score object;
    /// the shape is checked here before anything is persisted.
    pub fn validate_for(game_type: GameType, value: Value) -> Result<Score> {
        match game_type {
            GameType::Cricket => {
                let score: CricketScore = serde_json::from_value(value)
                    .map_err(|e| AppError::invalid_data(format!("Invalid cricket score: {}", e)))?;
                score.check()?;
                Ok(Score::Cricket(score))
            }
            GameType::Basketball => {
                let score: BasketballScore = serde_json::from_value(value).map_err(|e| {
                    AppError::invalid_data(format!("Invalid basketball score: {}", e))
                })?;
                Ok(Score::Basketball(score))
            }
            GameType::Football => {
                let score: FootballScore = serde_json::from_value(value)
                    .map_err(|e| AppError::invalid_data(format!("Invalid football score: {}", e)))?;
                Ok(Score::Football(score))
            }
            GameType::Custom => {
                if !value.is_object() {
                    return Err(AppError::invalid_data("Score must be an object"));
                }
                let doc: Document = serde_json::from_value(value)
                    .map_err(|e| AppError::invalid_data(format!("Invalid score: {}", e)))?;
                Ok(Score::Custom(doc))
            }
        }
    }
}

impl CricketScore {
    fn check(&self) -> Result<()> {
        for innings in [&self.team1, &self.team2] {
            if innings.wickets > 10 {
                return Err(AppError::invalid_data("Wickets must be between 0 and 10"));
            }
            if !innings.overs.is_finite() || innings.overs < 0.0 {
                return Err(AppError::invalid_data("Overs must be a non-negative number"));
            }
        }
        if !(1..=2).contains(&self.current_innings) {
            return Err(AppError::invalid_data("Current innings must be 1 or 2"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub game_type: GameType,
    pub name: String,
    pub creator: ObjectId,
    pub participants: Vec<Participant>,
    pub room_code: String,
    pub status: GameStatus,
    pub current_score: Score,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<BsonDateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<BsonDateTime>,

    #[serde(default)]
    pub metadata: Document,

    pub created_at: BsonDateTime,
    pub updated_at: BsonDateTime,
}

impl Game {
    pub fn is_participant(&self, user_id: &ObjectId) -> bool {
        self.participants.iter().any(|p| p.user_id == *user_id)
    }

    pub fn role_of(&self, user_id: &ObjectId) -> Option<Role> {
        self.participants
            .iter()
            .find(|p| p.user_id == *user_id)
            .map(|p| p.role)
    }
}

// Request payloads

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGame {
    pub game_type: GameType,

    #[validate(length(min = 1, max = 100, message = "Game name must be 1-100 characters"))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinGame {
    #[validate(length(equal = 6, message = "Room code must be exactly 6 characters"))]
    pub room_code: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateGameStatus {
    pub status: GameStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateScore {
    pub current_score: Value,
    pub event_type: Option<crate::models::score_event::EventType>,
    pub event_data: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameQuery {
    pub status: Option<GameStatus>,
    pub game_type: Option<GameType>,
    pub page: Option<u64>,
    pub limit: Option<i64>,
}

// Response shapes (ids as hex strings, timestamps as RFC 3339)

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantResponse {
    pub user_id: String,
    pub role: Role,
    pub joined_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResponse {
    pub id: String,
    pub game_type: GameType,
    pub name: String,
    pub creator: String,
    pub participants: Vec<ParticipantResponse>,
    pub room_code: String,
    pub status: GameStatus,
    pub current_score: Score,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Game> for GameResponse {
    fn from(game: Game) -> Self {
        GameResponse {
            id: game.id.map(|id| id.to_hex()).unwrap_or_default(),
            game_type: game.game_type,
            name: game.name,
            creator: game.creator.to_hex(),
            participants: game
                .participants
                .into_iter()
                .map(|p| ParticipantResponse {
                    user_id: p.user_id.to_hex(),
                    role: p.role,
                    joined_at: p.joined_at.to_chrono().to_rfc3339(),
                })
                .collect(),
            room_code: game.room_code,
            status: game.status,
            current_score: game.current_score,
            start_time: game.start_time.map(|t| t.to_chrono().to_rfc3339()),
            end_time: game.end_time.map(|t| t.to_chrono().to_rfc3339()),
            created_at: game.created_at.to_chrono().to_rfc3339(),
            updated_at: game.updated_at.to_chrono().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: u64,
    pub page: u64,
    pub pages: u64,
    pub limit: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn participant(user_id: ObjectId, role: Role) -> Participant {
        Participant {
            user_id,
            role,
            joined_at: BsonDateTime::now(),
        }
    }

    #[test]
    fn initial_cricket_score_is_zeroed_with_first_innings() {
        match Score::initial(GameType::Cricket) {
            Score::Cricket(s) => {
                assert_eq!(s.team1.runs, 0);
                assert_eq!(s.team1.wickets, 0);
                assert_eq!(s.team2.runs, 0);
                assert_eq!(s.current_innings, 1);
            }
            other => panic!("unexpected score shape: {:?}", other),
        }
    }

    #[test]
    fn cricket_score_validates_against_declared_type() {
        let value = json!({
            "team1": { "runs": 4, "wickets": 0, "overs": 0.4 },
            "team2": { "runs": 0, "wickets": 0, "overs": 0.0 },
            "currentInnings": 1,
        });
        let score = Score::validate_for(GameType::Cricket, value).unwrap();
        match score {
            Score::Cricket(s) => assert_eq!(s.team1.runs, 4),
            other => panic!("unexpected score shape: {:?}", other),
        }
    }

    #[test]
    fn cricket_score_rejects_eleven_wickets() {
        let value = json!({
            "team1": { "runs": 10, "wickets": 11, "overs": 2.0 },
            "team2": { "runs": 0, "wickets": 0, "overs": 0.0 },
            "currentInnings": 1,
        });
        assert!(Score::validate_for(GameType::Cricket, value).is_err());
    }

    #[test]
    fn cricket_score_rejects_negative_overs() {
        let value = json!({
            "team1": { "runs": 10, "wickets": 1, "overs": -1.0 },
            "team2": { "runs": 0, "wickets": 0, "overs": 0.0 },
            "currentInnings": 1,
        });
        assert!(Score::validate_for(GameType::Cricket, value).is_err());
    }

    #[test]
    fn basketball_shape_is_rejected_for_football_game() {
        let value = json!({ "team1": 2, "team2": 0, "quarter": 1 });
        assert!(Score::validate_for(GameType::Football, value).is_err());
    }

    #[test]
    fn football_score_accepts_its_own_shape() {
        let value = json!({ "team1": 2, "team2": 1, "half": 2 });
        let score = Score::validate_for(GameType::Football, value).unwrap();
        assert_eq!(
            score,
            Score::Football(FootballScore { team1: 2, team2: 1, half: 2 })
        );
    }

    #[test]
    fn custom_score_accepts_any_object_but_not_scalars() {
        let value = json!({ "laps": 12, "leader": "team A" });
        assert!(Score::validate_for(GameType::Custom, value).is_ok());
        assert!(Score::validate_for(GameType::Custom, json!(42)).is_err());
    }

    #[test]
    fn status_transition_matrix() {
        use GameStatus::*;
        assert!(Waiting.can_transition_to(Live));
        assert!(Waiting.can_transition_to(Cancelled));
        assert!(Live.can_transition_to(Completed));
        assert!(Live.can_transition_to(Cancelled));

        assert!(!Waiting.can_transition_to(Completed));
        assert!(!Live.can_transition_to(Waiting));
        assert!(!Completed.can_transition_to(Live));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Live));
    }

    #[test]
    fn role_lookup_distinguishes_participants() {
        let creator = ObjectId::new();
        let viewer = ObjectId::new();
        let stranger = ObjectId::new();

        let game = Game {
            id: Some(ObjectId::new()),
            game_type: GameType::Cricket,
            name: "Finals".to_string(),
            creator,
            participants: vec![
                participant(creator, Role::Creator),
                participant(viewer, Role::Viewer),
            ],
            room_code: "A1B2C3".to_string(),
            status: GameStatus::Waiting,
            current_score: Score::initial(GameType::Cricket),
            start_time: None,
            end_time: None,
            metadata: Document::new(),
            created_at: BsonDateTime::now(),
            updated_at: BsonDateTime::now(),
        };

        assert_eq!(game.role_of(&creator), Some(Role::Creator));
        assert_eq!(game.role_of(&viewer), Some(Role::Viewer));
        assert_eq!(game.role_of(&stranger), None);
        assert!(game.is_participant(&viewer));
        assert!(!game.is_participant(&stranger));
    }
}
