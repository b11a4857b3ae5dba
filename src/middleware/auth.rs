use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use mongodb::bson::oid::ObjectId;

use crate::errors::{AppError, Result};
use crate::state::AppState;

/// The authenticated identity, inserted into request extensions for
/// downstream handlers.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: ObjectId,
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let token = headers
        .get("authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthenticated)?;

    let claims = state.tokens.verify_access(token)?;
    let user_id = ObjectId::parse_str(&claims.sub).map_err(|_| AppError::Unauthenticated)?;

    request.extensions_mut().insert(AuthUser { id: user_id });

    Ok(next.run(request).await)
}
