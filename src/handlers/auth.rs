//! Identity lifecycle: registration, login, refresh, logout, me. The
//! realtime core only consumes the tokens these handlers issue.

use axum::{extract::State, http::StatusCode, response::Json, Extension};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Collection;
use serde_json::{json, Value};
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::user::{LoginUser, RefreshRequest, RegisterUser, User, UserResponse};
use crate::state::AppState;

fn users(state: &AppState) -> Collection<User> {
    state.db.collection("users")
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUser>,
) -> Result<(StatusCode, Json<Value>)> {
    payload.validate()?;

    let collection = users(&state);

    let email = payload.email.trim().to_lowercase();
    let filter = doc! {
        "$or": [
            { "username": &payload.username },
            { "email": &email },
        ]
    };
    if collection.find_one(filter).await?.is_some() {
        return Err(AppError::conflict("Username or email already exists"));
    }

    let password = hash(&payload.password, DEFAULT_COST)
        .map_err(|e| AppError::service(format!("Password hashing failed: {}", e)))?;

    let user = User {
        id: None,
        username: payload.username.clone(),
        email,
        password,
        refresh_token: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    let insert_result = collection.insert_one(&user).await?;
    let user_id = insert_result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| AppError::service("Failed to read inserted user id"))?;

    let access_token = state.tokens.sign_access(&user_id.to_hex())?;
    let refresh_token = state.tokens.sign_refresh(&user_id.to_hex())?;
    collection
        .update_one(
            doc! { "_id": user_id },
            doc! { "$set": { "refreshToken": &refresh_token } },
        )
        .await?;

    tracing::info!("📝 Registered user {}", user.username);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User registered successfully",
            "user": UserResponse {
                id: user_id.to_hex(),
                username: user.username,
                email: user.email,
            },
            "accessToken": access_token,
            "refreshToken": refresh_token,
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginUser>,
) -> Result<Json<Value>> {
    let collection = users(&state);

    let email = payload.email.trim().to_lowercase();
    let user = collection
        .find_one(doc! { "email": &email })
        .await?
        .ok_or(AppError::Unauthenticated)?;

    let valid = verify(&payload.password, &user.password).map_err(|_| AppError::Unauthenticated)?;
    if !valid {
        return Err(AppError::Unauthenticated);
    }

    let user_id = user.id.ok_or_else(|| AppError::service("User has no id"))?;
    let access_token = state.tokens.sign_access(&user_id.to_hex())?;
    let refresh_token = state.tokens.sign_refresh(&user_id.to_hex())?;
    collection
        .update_one(
            doc! { "_id": user_id },
            doc! { "$set": { "refreshToken": &refresh_token } },
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Logged in successfully",
        "user": UserResponse::from(&user),
        "accessToken": access_token,
        "refreshToken": refresh_token,
    })))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<Value>> {
    let claims = state.tokens.verify_refresh(&payload.refresh_token)?;
    let user_id = ObjectId::parse_str(&claims.sub).map_err(|_| AppError::Unauthenticated)?;

    let user = users(&state)
        .find_one(doc! { "_id": user_id })
        .await?
        .ok_or(AppError::Unauthenticated)?;

    // A refresh token that was rotated out or cleared by logout is dead.
    if user.refresh_token.as_deref() != Some(payload.refresh_token.as_str()) {
        return Err(AppError::Unauthenticated);
    }

    let access_token = state.tokens.sign_access(&user_id.to_hex())?;

    Ok(Json(json!({
        "success": true,
        "accessToken": access_token,
    })))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>> {
    users(&state)
        .update_one(
            doc! { "_id": auth.id },
            doc! { "$unset": { "refreshToken": 1 } },
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Logged out successfully",
    })))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Value>> {
    let user = users(&state)
        .find_one(doc! { "_id": auth.id })
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(Json(json!({
        "success": true,
        "user": UserResponse::from(&user),
    })))
}
