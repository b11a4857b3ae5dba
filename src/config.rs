// config.rs
use std::env;

use crate::errors::{AppError, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub db_name: String,
    pub jwt_access_secret: String,
    pub jwt_refresh_secret: String,
    pub client_url: String,
    pub port: u16,
    pub host: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(AppConfig {
            database_url: env::var("DATABASE_URL").map_err(|_| {
                AppError::ConfigurationError("DATABASE_URL must be set".to_string())
            })?,
            db_name: env::var("DB_NAME").unwrap_or_else(|_| "scorydb".to_string()),
            jwt_access_secret: env::var("JWT_ACCESS_SECRET").map_err(|_| {
                AppError::ConfigurationError("JWT_ACCESS_SECRET must be set".to_string())
            })?,
            jwt_refresh_secret: env::var("JWT_REFRESH_SECRET").map_err(|_| {
                AppError::ConfigurationError("JWT_REFRESH_SECRET must be set".to_string())
            })?,
            client_url: env::var("CLIENT_URL").unwrap_or_else(|_| "*".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .map_err(|_| AppError::ConfigurationError("PORT must be a number".to_string()))?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
        })
    }
}
