//! Durable game store. Owns the `games` and `scoreevents` collections;
//! the realtime hub and the HTTP handlers read and write games only
//! through here.

use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, to_bson, DateTime as BsonDateTime, Document};
use mongodb::{Collection, Database};
use rand::RngCore;

use crate::errors::{AppError, Result};
use crate::models::game::{Game, GameStatus, GameType, Participant, Role, Score};
use crate::models::score_event::{EventType, ScoreEvent};

const GAMES: &str = "games";
const SCORE_EVENTS: &str = "scoreevents";

#[derive(Clone)]
pub struct GameDirectory {
    db: Database,
}

impl GameDirectory {
    pub fn new(db: Database) -> Self {
        GameDirectory { db }
    }

    fn games(&self) -> Collection<Game> {
        self.db.collection(GAMES)
    }

    fn events(&self) -> Collection<ScoreEvent> {
        self.db.collection(SCORE_EVENTS)
    }

    pub async fn create_game(
        &self,
        game_type: GameType,
        name: String,
        creator: ObjectId,
    ) -> Result<Game> {
        let room_code = self.generate_room_code().await?;
        let now = BsonDateTime::now();

        let mut game = Game {
            id: None,
            game_type,
            name,
            creator,
            participants: vec![Participant {
                user_id: creator,
                role: Role::Creator,
                joined_at: now,
            }],
            room_code,
            status: GameStatus::Waiting,
            current_score: Score::initial(game_type),
            start_time: None,
            end_time: None,
            metadata: Document::new(),
            created_at: now,
            updated_at: now,
        };

        let insert_result = self.games().insert_one(&game).await?;
        let id = insert_result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| AppError::service("Failed to read inserted game id"))?;
        game.id = Some(id);

        Ok(game)
    }

    /// Room codes are 6 uppercase hex characters; generation retries
    /// until the code is unused among existing games.
    pub async fn generate_room_code(&self) -> Result<String> {
        loop {
            let code = random_room_code();
            let existing = self.games().find_one(doc! { "roomCode": &code }).await?;
            if existing.is_none() {
                return Ok(code);
            }
        }
    }

    pub async fn find_by_id(&self, id: ObjectId) -> Result<Option<Game>> {
        Ok(self.games().find_one(doc! { "_id": id }).await?)
    }

    pub async fn find_by_room_code(&self, room_code: &str) -> Result<Option<Game>> {
        Ok(self
            .games()
            .find_one(doc! { "roomCode": room_code })
            .await?)
    }

    pub async fn list(
        &self,
        status: Option<GameStatus>,
        game_type: Option<GameType>,
        page: u64,
        limit: i64,
    ) -> Result<(Vec<Game>, u64)> {
        let mut filter = doc! {};
        if let Some(status) = status {
            filter.insert("status", bson_value(&status)?);
        }
        if let Some(game_type) = game_type {
            filter.insert("gameType", bson_value(&game_type)?);
        }

        let total = self.games().count_documents(filter.clone()).await?;

        let skip = (page - 1) * limit as u64;
        let cursor = self
            .games()
            .find(filter)
            .sort(doc! { "createdAt": -1 })
            .skip(skip)
            .limit(limit)
            .await?;
        let games: Vec<Game> = cursor.try_collect().await?;

        Ok((games, total))
    }

    pub async fn add_participant(
        &self,
        game_id: ObjectId,
        user_id: ObjectId,
        role: Role,
    ) -> Result<()> {
        let participant = Participant {
            user_id,
            role,
            joined_at: BsonDateTime::now(),
        };
        self.games()
            .update_one(
                doc! { "_id": game_id },
                doc! {
                    "$push": { "participants": bson_value(&participant)? },
                    "$set": { "updatedAt": BsonDateTime::now() },
                },
            )
            .await?;
        Ok(())
    }

    pub async fn remove_participant(&self, game_id: ObjectId, user_id: ObjectId) -> Result<()> {
        self.games()
            .update_one(
                doc! { "_id": game_id },
                doc! {
                    "$pull": { "participants": { "userId": user_id } },
                    "$set": { "updatedAt": BsonDateTime::now() },
                },
            )
            .await?;
        Ok(())
    }

    pub async fn update_score(&self, game_id: ObjectId, score: &Score) -> Result<()> {
        self.games()
            .update_one(
                doc! { "_id": game_id },
                doc! {
                    "$set": {
                        "currentScore": bson_value(score)?,
                        "updatedAt": BsonDateTime::now(),
                    },
                },
            )
            .await?;
        Ok(())
    }

    pub async fn update_status(
        &self,
        game_id: ObjectId,
        status: GameStatus,
        start_time: Option<BsonDateTime>,
        end_time: Option<BsonDateTime>,
    ) -> Result<()> {
        let mut set = doc! {
            "status": bson_value(&status)?,
            "updatedAt": BsonDateTime::now(),
        };
        if let Some(start_time) = start_time {
            set.insert("startTime", start_time);
        }
        if let Some(end_time) = end_time {
            set.insert("endTime", end_time);
        }

        self.games()
            .update_one(doc! { "_id": game_id }, doc! { "$set": set })
            .await?;
        Ok(())
    }

    pub async fn append_event(
        &self,
        game_id: ObjectId,
        user_id: ObjectId,
        event_type: EventType,
        event_data: Document,
    ) -> Result<ScoreEvent> {
        let mut event = ScoreEvent {
            id: None,
            game_id,
            user_id,
            event_type,
            event_data,
            timestamp: BsonDateTime::now(),
        };

        let insert_result = self.events().insert_one(&event).await?;
        event.id = insert_result.inserted_id.as_object_id();

        Ok(event)
    }

    /// Events for a game, newest first.
    pub async fn recent_events(&self, game_id: ObjectId, limit: i64) -> Result<Vec<ScoreEvent>> {
        let cursor = self
            .events()
            .find(doc! { "gameId": game_id })
            .sort(doc! { "timestamp": -1 })
            .limit(limit)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    /// Deletes the game and cascades its score-event log.
    pub async fn delete_game(&self, game_id: ObjectId) -> Result<()> {
        self.games().delete_one(doc! { "_id": game_id }).await?;
        self.events()
            .delete_many(doc! { "gameId": game_id })
            .await?;
        Ok(())
    }
}

pub fn random_room_code() -> String {
    let mut bytes = [0u8; 3];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{:02X}{:02X}{:02X}", bytes[0], bytes[1], bytes[2])
}

fn bson_value<T: serde::Serialize>(value: &T) -> Result<mongodb::bson::Bson> {
    to_bson(value).map_err(|e| AppError::service(format!("BSON serialization failed: {}", e)))
}
