pub mod game;
pub mod score_event;
pub mod user;
