use chrono::{DateTime, Utc};
use mongodb::bson;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub username: String,
    pub email: String,
    pub password: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterUser {
    #[validate(
        length(min = 3, max = 20, message = "Username must be 3-20 characters"),
        custom(function = "validate_username")
    )]
    pub username: String,

    #[validate(email(message = "Please provide a valid email address"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginUser {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        UserResponse {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        let mut err = ValidationError::new("username");
        err.message = Some("Username can only contain letters, numbers, and underscores".into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_payload_accepts_valid_input() {
        let payload = RegisterUser {
            username: "match_scorer_1".to_string(),
            email: "scorer@example.com".to_string(),
            password: "correcthorse".to_string(),
        };
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn register_payload_rejects_bad_username_charset() {
        let payload = RegisterUser {
            username: "not ok!".to_string(),
            email: "scorer@example.com".to_string(),
            password: "correcthorse".to_string(),
        };
        assert!(payload.validate().is_err());
    }

    #[test]
    fn register_payload_rejects_short_password() {
        let payload = RegisterUser {
            username: "scorer".to_string(),
            email: "scorer@example.com".to_string(),
            password: "short".to_string(),
        };
        assert!(payload.validate().is_err());
    }
}
