//! The realtime hub: the single authorize -> persist -> broadcast path for
//! every score-state mutation, whether it arrives over the websocket or
//! through the HTTP API. Mutations for one game are serialized by a
//! per-game lock; different games run fully concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime, Document};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::authz::{role_allows, Action};
use crate::directory::GameDirectory;
use crate::errors::{AppError, Result};
use crate::models::game::{Game, GameStatus, Score};
use crate::models::score_event::EventType;

use super::protocol::{ClientMessage, ServerMessage};
use super::rooms::{RoomMembershipTable, SessionId};

pub struct RealtimeHub {
    directory: GameDirectory,
    pub rooms: RoomMembershipTable,
    game_locks: Mutex<HashMap<ObjectId, Arc<Mutex<()>>>>,
}

impl RealtimeHub {
    pub fn new(directory: GameDirectory) -> Self {
        RealtimeHub {
            directory,
            rooms: RoomMembershipTable::new(),
            game_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn directory(&self) -> &GameDirectory {
        &self.directory
    }

    /// Per-game mutual exclusion. Persist order under this lock is
    /// broadcast order and log order; both entry points must hold it for
    /// any persist-then-broadcast sequence.
    async fn game_lock(&self, game_id: ObjectId) -> Arc<Mutex<()>> {
        let mut locks = self.game_locks.lock().await;
        locks
            .entry(game_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Handles one inbound websocket message for an authenticated session.
    /// Errors are returned to the caller, which reports them to the
    /// originating session only.
    pub async fn handle_message(
        &self,
        session_id: SessionId,
        user_id: ObjectId,
        message: ClientMessage,
    ) -> Result<()> {
        match message {
            ClientMessage::JoinGame { game_id } => {
                let game_id = parse_game_id(&game_id)?;
                // Live presence is open to any authenticated session, but
                // the game must exist.
                if self.directory.find_by_id(game_id).await?.is_none() {
                    return Err(AppError::not_found("Game not found"));
                }
                self.rooms.join(game_id, session_id).await;
                Ok(())
            }
            ClientMessage::LeaveGame { game_id } => {
                let game_id = parse_game_id(&game_id)?;
                self.rooms.leave(game_id, session_id).await;
                Ok(())
            }
            ClientMessage::ScoreUpdate {
                game_id,
                current_score,
                event_type,
                event_data,
            } => {
                let game_id = parse_game_id(&game_id)?;
                // The originating session already applied the change
                // optimistically, so it is excluded from the fan-out.
                self.submit_score_change(
                    game_id,
                    user_id,
                    current_score,
                    event_type,
                    event_data,
                    Some(session_id),
                )
                .await
                .map(|_| ())
            }
        }
    }

    /// The shared score-mutation path: lookup, authorize, state check,
    /// validate, persist, log, broadcast. Persist failures abort before
    /// any broadcast.
    pub async fn submit_score_change(
        &self,
        game_id: ObjectId,
        actor: ObjectId,
        current_score: Value,
        event_type: Option<EventType>,
        event_data: Option<Value>,
        exclude: Option<SessionId>,
    ) -> Result<Score> {
        let lock = self.game_lock(game_id).await;
        let _guard = lock.lock().await;

        let game = self
            .directory
            .find_by_id(game_id)
            .await?
            .ok_or_else(|| AppError::not_found("Game not found"))?;

        authorize_score_change(&game, actor)?;

        let score = Score::validate_for(game.game_type, current_score)?;
        self.directory.update_score(game_id, &score).await?;

        // The event log entry is recorded only when both fields are sent.
        if let (Some(event_type), Some(event_data)) = (event_type, event_data.clone()) {
            let data = document_from_value(event_data)?;
            self.directory
                .append_event(game_id, actor, event_type, data)
                .await?;
        }

        self.rooms
            .broadcast(
                game_id,
                ServerMessage::ScoreUpdated {
                    game_id: game_id.to_hex(),
                    current_score: score.clone(),
                    event_type,
                    event_data,
                    actor_id: actor.to_hex(),
                    timestamp: Utc::now().to_rfc3339(),
                },
                exclude,
            )
            .await;

        Ok(score)
    }

    /// Creator-only status transitions. Entering live stamps the start
    /// time once; entering a terminal state stamps the end time once.
    pub async fn submit_status_change(
        &self,
        game_id: ObjectId,
        actor: ObjectId,
        new_status: GameStatus,
    ) -> Result<Game> {
        let lock = self.game_lock(game_id).await;
        let _guard = lock.lock().await;

        let mut game = self
            .directory
            .find_by_id(game_id)
            .await?
            .ok_or_else(|| AppError::not_found("Game not found"))?;

        if game.creator != actor {
            return Err(AppError::forbidden(
                "Only the creator can update game status",
            ));
        }
        if !game.status.can_transition_to(new_status) {
            return Err(AppError::invalid_transition(format!(
                "Cannot change status from {} to {}",
                game.status, new_status
            )));
        }

        let now = BsonDateTime::now();
        let start_time =
            (new_status == GameStatus::Live && game.start_time.is_none()).then_some(now);
        let end_time = (new_status.is_terminal() && game.end_time.is_none()).then_some(now);

        self.directory
            .update_status(game_id, new_status, start_time, end_time)
            .await?;

        self.rooms
            .broadcast(
                game_id,
                ServerMessage::GameStatusUpdated {
                    game_id: game_id.to_hex(),
                    status: new_status,
                },
                None,
            )
            .await;

        game.status = new_status;
        game.start_time = game.start_time.or(start_time);
        game.end_time = game.end_time.or(end_time);
        game.updated_at = now;
        Ok(game)
    }

    /// Creator-only deletion, cascading the score-event log. Runs under
    /// the same per-game lock as mutations so a racing score update
    /// cannot broadcast after the delete.
    pub async fn delete_game(&self, game_id: ObjectId, actor: ObjectId) -> Result<()> {
        let lock = self.game_lock(game_id).await;
        let _guard = lock.lock().await;

        let game = self
            .directory
            .find_by_id(game_id)
            .await?
            .ok_or_else(|| AppError::not_found("Game not found"))?;

        if game.creator != actor {
            return Err(AppError::forbidden("Only the creator can delete the game"));
        }

        self.directory.delete_game(game_id).await?;

        self.rooms
            .broadcast(
                game_id,
                ServerMessage::GameDeleted {
                    game_id: game_id.to_hex(),
                },
                None,
            )
            .await;

        self.game_locks.lock().await.remove(&game_id);
        Ok(())
    }
}

/// Pure authorization + state check for a score mutation, shared by both
/// entry points.
fn authorize_score_change(game: &Game, actor: ObjectId) -> Result<()> {
    let role = game
        .role_of(&actor)
        .ok_or_else(|| AppError::forbidden("You do not have permission to update scores"))?;
    if !role_allows(role, Action::UpdateScore) {
        return Err(AppError::forbidden(
            "You do not have permission to update scores",
        ));
    }
    if game.status != GameStatus::Live {
        return Err(AppError::invalid_state(
            "Can only update scores for live games",
        ));
    }
    Ok(())
}

pub fn parse_game_id(raw: &str) -> Result<ObjectId> {
    ObjectId::parse_str(raw).map_err(|_| AppError::invalid_data("Invalid game ID format"))
}

fn document_from_value(value: Value) -> Result<Document> {
    if !value.is_object() {
        return Err(AppError::invalid_data("Event data must be an object"));
    }
    serde_json::from_value(value)
        .map_err(|e| AppError::invalid_data(format!("Invalid event data: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::game::{GameType, Participant, Role};

    fn game_with(status: GameStatus, participants: Vec<(ObjectId, Role)>) -> Game {
        let creator = participants
            .iter()
            .find(|(_, role)| *role == Role::Creator)
            .map(|(id, _)| *id)
            .unwrap_or_else(ObjectId::new);
        Game {
            id: Some(ObjectId::new()),
            game_type: GameType::Cricket,
            name: "Finals".to_string(),
            creator,
            participants: participants
                .into_iter()
                .map(|(user_id, role)| Participant {
                    user_id,
                    role,
                    joined_at: BsonDateTime::now(),
                })
                .collect(),
            room_code: "0AF9B2".to_string(),
            status,
            current_score: Score::initial(GameType::Cricket),
            start_time: None,
            end_time: None,
            metadata: Document::new(),
            created_at: BsonDateTime::now(),
            updated_at: BsonDateTime::now(),
        }
    }

    #[test]
    fn viewer_mutation_is_forbidden() {
        let viewer = ObjectId::new();
        let game = game_with(
            GameStatus::Live,
            vec![(ObjectId::new(), Role::Creator), (viewer, Role::Viewer)],
        );
        assert!(matches!(
            authorize_score_change(&game, viewer),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn non_participant_mutation_is_forbidden() {
        let game = game_with(GameStatus::Live, vec![(ObjectId::new(), Role::Creator)]);
        assert!(matches!(
            authorize_score_change(&game, ObjectId::new()),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn mutation_outside_live_is_invalid_state() {
        let scorer = ObjectId::new();
        for status in [GameStatus::Waiting, GameStatus::Completed, GameStatus::Cancelled] {
            let game = game_with(
                status,
                vec![(ObjectId::new(), Role::Creator), (scorer, Role::Scorer)],
            );
            assert!(matches!(
                authorize_score_change(&game, scorer),
                Err(AppError::InvalidState(_))
            ));
        }
    }

    #[test]
    fn scorer_mutation_on_live_game_is_allowed() {
        let scorer = ObjectId::new();
        let game = game_with(
            GameStatus::Live,
            vec![(ObjectId::new(), Role::Creator), (scorer, Role::Scorer)],
        );
        assert!(authorize_score_change(&game, scorer).is_ok());
    }

    #[test]
    fn bad_game_id_is_a_validation_error() {
        assert!(matches!(
            parse_game_id("not-an-object-id"),
            Err(AppError::ValidationError(_))
        ));
    }

    // The per-game lock must serialize two racing critical sections into
    // one total order: both append (start, end) pairs with no interleave.
    #[tokio::test]
    async fn game_lock_serializes_racing_mutations() {
        use std::sync::Arc as StdArc;

        let lock = StdArc::new(Mutex::new(()));
        let trace = StdArc::new(Mutex::new(Vec::new()));

        let mut tasks = Vec::new();
        for i in 0..2 {
            let lock = lock.clone();
            let trace = trace.clone();
            tasks.push(tokio::spawn(async move {
                let _guard = lock.lock().await;
                trace.lock().await.push(format!("start{}", i));
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                trace.lock().await.push(format!("end{}", i));
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let trace = trace.lock().await;
        assert!(
            *trace == vec!["start0", "end0", "start1", "end1"]
                || *trace == vec!["start1", "end1", "start0", "end0"],
            "interleaved critical sections: {:?}",
            *trace
        );
    }
}
