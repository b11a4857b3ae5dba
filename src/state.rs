use std::sync::Arc;

use mongodb::Database;

use crate::realtime::RealtimeHub;
use crate::services::tokens::TokenService;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub tokens: Arc<TokenService>,
    pub hub: Arc<RealtimeHub>,
}

impl AppState {
    pub fn new(db: Database, tokens: Arc<TokenService>, hub: Arc<RealtimeHub>) -> Self {
        AppState { db, tokens, hub }
    }
}
