//! Identity verification. One service signs and verifies both token kinds;
//! the HTTP middleware and the websocket handshake call the same
//! `verify_access`, so a credential means exactly the same thing on both
//! paths.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, Result};

pub const ISSUER: &str = "scory-api";
pub const AUDIENCE: &str = "scory-client";

const ACCESS_TTL_SECS: i64 = 15 * 60;
const REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: usize,
}

pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl TokenService {
    pub fn new(access_secret: &str, refresh_secret: &str) -> Self {
        TokenService {
            access_encoding: EncodingKey::from_secret(access_secret.as_ref()),
            access_decoding: DecodingKey::from_secret(access_secret.as_ref()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_ref()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_ref()),
        }
    }

    pub fn sign_access(&self, user_id: &str) -> Result<String> {
        sign(&self.access_encoding, user_id, ACCESS_TTL_SECS)
    }

    pub fn sign_refresh(&self, user_id: &str) -> Result<String> {
        sign(&self.refresh_encoding, user_id, REFRESH_TTL_SECS)
    }

    /// Verifies an access token. Every failure mode (missing claims, bad
    /// signature, expiry, wrong issuer or audience) yields the same
    /// `Unauthenticated` error so callers cannot distinguish them.
    pub fn verify_access(&self, token: &str) -> Result<Claims> {
        verify(&self.access_decoding, token)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims> {
        verify(&self.refresh_decoding, token)
    }
}

fn sign(key: &EncodingKey, user_id: &str, ttl_secs: i64) -> Result<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        iss: ISSUER.to_string(),
        aud: AUDIENCE.to_string(),
        exp: (Utc::now().timestamp() + ttl_secs) as usize,
    };
    encode(&Header::default(), &claims, key)
        .map_err(|e| AppError::service(format!("Failed to sign token: {}", e)))
}

fn verify(key: &DecodingKey, token: &str) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.set_audience(&[AUDIENCE]);

    decode::<Claims>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(|_| AppError::Unauthenticated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("access-secret", "refresh-secret")
    }

    #[test]
    fn access_token_round_trips() {
        let tokens = service();
        let token = tokens.sign_access("64f000000000000000000001").unwrap();
        let claims = tokens.verify_access(&token).unwrap();
        assert_eq!(claims.sub, "64f000000000000000000001");
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.aud, AUDIENCE);
    }

    #[test]
    fn refresh_token_is_not_a_valid_access_token() {
        let tokens = service();
        let refresh = tokens.sign_refresh("64f000000000000000000001").unwrap();
        assert!(matches!(
            tokens.verify_access(&refresh),
            Err(AppError::Unauthenticated)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = service();
        let claims = Claims {
            sub: "64f000000000000000000001".to_string(),
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            exp: (Utc::now().timestamp() - 7200) as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("access-secret".as_ref()),
        )
        .unwrap();
        assert!(matches!(
            tokens.verify_access(&token),
            Err(AppError::Unauthenticated)
        ));
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let tokens = service();
        let claims = Claims {
            sub: "64f000000000000000000001".to_string(),
            iss: "someone-else".to_string(),
            aud: AUDIENCE.to_string(),
            exp: (Utc::now().timestamp() + 600) as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("access-secret".as_ref()),
        )
        .unwrap();
        assert!(matches!(
            tokens.verify_access(&token),
            Err(AppError::Unauthenticated)
        ));
    }

    #[test]
    fn garbage_token_is_rejected() {
        let tokens = service();
        assert!(matches!(
            tokens.verify_access("not-a-jwt"),
            Err(AppError::Unauthenticated)
        ));
    }
}
