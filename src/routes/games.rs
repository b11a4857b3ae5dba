use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::handlers::games;
use crate::middleware::auth::auth_middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(games::create_game).get(games::get_games))
        .route("/join", post(games::join_game))
        .route("/:id", get(games::get_game).delete(games::delete_game))
        .route("/:id/leave", post(games::leave_game))
        .route("/:id/status", put(games::update_status))
        .route("/:id/score", put(games::update_score))
        .route("/:id/events", get(games::get_events))
        .layer(middleware::from_fn_with_state(state, auth_middleware))
}
