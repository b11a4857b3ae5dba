//! HTTP mirror of the realtime mutation path. Score and status changes
//! call straight into the hub so both entry points share one
//! authorize -> persist -> broadcast implementation.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use mongodb::bson::oid::ObjectId;
use serde_json::{json, Value};
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::game::{
    CreateGame, GameQuery, GameResponse, JoinGame, Pagination, Role, UpdateGameStatus, UpdateScore,
};
use crate::models::score_event::{EventsQuery, ScoreEventResponse};
use crate::realtime::hub::parse_game_id;
use crate::realtime::protocol::ServerMessage;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 100;

pub async fn create_game(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CreateGame>,
) -> Result<(StatusCode, Json<Value>)> {
    payload.validate()?;

    let game = state
        .hub
        .directory()
        .create_game(payload.game_type, payload.name.trim().to_string(), auth.id)
        .await?;

    tracing::info!(
        "🎮 Game '{}' created with room code {}",
        game.name,
        game.room_code
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Game created successfully",
            "game": GameResponse::from(game),
        })),
    ))
}

pub async fn get_games(
    State(state): State<AppState>,
    Query(query): Query<GameQuery>,
) -> Result<Json<Value>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let (games, total) = state
        .hub
        .directory()
        .list(query.status, query.game_type, page, limit)
        .await?;

    let games: Vec<GameResponse> = games.into_iter().map(GameResponse::from).collect();
    let pages = (total + limit as u64 - 1) / limit as u64;

    Ok(Json(json!({
        "success": true,
        "games": games,
        "pagination": Pagination { total, page, pages, limit },
    })))
}

pub async fn get_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let game_id = parse_game_id(&id)?;
    let game = state
        .hub
        .directory()
        .find_by_id(game_id)
        .await?
        .ok_or_else(|| AppError::not_found("Game not found"))?;

    Ok(Json(json!({
        "success": true,
        "game": GameResponse::from(game),
    })))
}

pub async fn join_game(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<JoinGame>,
) -> Result<Json<Value>> {
    payload.validate()?;
    let room_code = payload.room_code.trim().to_uppercase();

    let game = state
        .hub
        .directory()
        .find_by_room_code(&room_code)
        .await?
        .ok_or_else(|| AppError::not_found("Game not found with this room code"))?;

    if game.is_participant(&auth.id) {
        return Err(AppError::conflict("You have already joined this game"));
    }
    if game.status.is_terminal() {
        return Err(AppError::invalid_state(format!(
            "Cannot join a {} game",
            game.status
        )));
    }

    let game_id = game.id.ok_or_else(|| AppError::service("Game has no id"))?;
    state
        .hub
        .directory()
        .add_participant(game_id, auth.id, Role::Viewer)
        .await?;

    state
        .hub
        .rooms
        .broadcast(
            game_id,
            ServerMessage::ParticipantJoined {
                game_id: game_id.to_hex(),
                actor_id: auth.id.to_hex(),
            },
            None,
        )
        .await;

    let game = state
        .hub
        .directory()
        .find_by_id(game_id)
        .await?
        .ok_or_else(|| AppError::not_found("Game not found"))?;

    Ok(Json(json!({
        "success": true,
        "message": "Joined game successfully",
        "game": GameResponse::from(game),
    })))
}

pub async fn leave_game(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let game_id = parse_game_id(&id)?;
    let game = state
        .hub
        .directory()
        .find_by_id(game_id)
        .await?
        .ok_or_else(|| AppError::not_found("Game not found"))?;

    if game.creator == auth.id {
        return Err(AppError::forbidden(
            "Creator cannot leave the game. Delete it instead.",
        ));
    }

    state
        .hub
        .directory()
        .remove_participant(game_id, auth.id)
        .await?;

    state
        .hub
        .rooms
        .broadcast(
            game_id,
            ServerMessage::ParticipantLeft {
                game_id: game_id.to_hex(),
                actor_id: auth.id.to_hex(),
            },
            None,
        )
        .await;

    Ok(Json(json!({
        "success": true,
        "message": "Left game successfully",
    })))
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateGameStatus>,
) -> Result<Json<Value>> {
    let game_id = parse_game_id(&id)?;
    let game = state
        .hub
        .submit_status_change(game_id, auth.id, payload.status)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Game status updated successfully",
        "game": GameResponse::from(game),
    })))
}

pub async fn update_score(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateScore>,
) -> Result<Json<Value>> {
    let game_id = parse_game_id(&id)?;
    let score = state
        .hub
        .submit_score_change(
            game_id,
            auth.id,
            payload.current_score,
            payload.event_type,
            payload.event_data,
            None,
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Score updated successfully",
        "currentScore": score,
    })))
}

pub async fn get_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Value>> {
    let game_id = parse_game_id(&id)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let events = state.hub.directory().recent_events(game_id, limit).await?;
    let events: Vec<ScoreEventResponse> =
        events.into_iter().map(ScoreEventResponse::from).collect();

    Ok(Json(json!({
        "success": true,
        "events": events,
    })))
}

pub async fn delete_game(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let game_id = parse_game_id(&id)?;
    state.hub.delete_game(game_id, auth.id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Game deleted successfully",
    })))
}
