use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::{HeaderValue, Method},
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

mod authz;
mod config;
mod database;
mod directory;
mod errors;
mod handlers;
mod middleware;
mod models;
mod realtime;
mod routes;
mod services;
mod state;

use config::AppConfig;
use database::connection::get_db_client;
use directory::GameDirectory;
use realtime::RealtimeHub;
use services::tokens::TokenService;
use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ {}", e);
            std::process::exit(1);
        }
    };

    let db = get_db_client(&config.database_url, &config.db_name).await;

    let tokens = Arc::new(TokenService::new(
        &config.jwt_access_secret,
        &config.jwt_refresh_secret,
    ));
    let hub = Arc::new(RealtimeHub::new(GameDirectory::new(db.clone())));
    let app_state = AppState::new(db, tokens, hub);

    let app = build_router(app_state, &config);
    start_server(app, &config).await;
}

fn build_router(app_state: AppState, config: &AppConfig) -> Router {
    let origin = match config.client_url.parse::<HeaderValue>() {
        Ok(value) if config.client_url != "*" => AllowOrigin::exact(value),
        _ => AllowOrigin::from(Any),
    };

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/ws", get(realtime::socket::ws_handler))
        .nest("/api/auth", routes::auth::routes(app_state.clone()))
        .nest("/api/games", routes::games::routes(app_state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

async fn start_server(app: Router, config: &AppConfig) {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], config.port)));

    tracing::info!("🚀 Server starting on {}", addr);
    tracing::info!("📡 Websocket endpoint: ws://{}/ws", addr);

    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Server error: {}", e);
            }
        }
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    }
}

async fn root_handler() -> &'static str {
    "🏏 Scory API"
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Scory API is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
