pub mod cli;
pub mod config;
pub mod handlers;
pub mod protocol;
pub mod registry;
pub mod resolver;
pub mod storage;
pub mod store;
pub mod websocket;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::websocket::AppState;

/// Build the full application router over the given state.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/create_player/", post(handlers::create_player))
        .route("/publish_game/", post(handlers::publish_game))
        .route("/join_game/", post(handlers::join_game))
        .route(
            "/game_updates/:game_id/:player_id/",
            get(websocket::game_updates_handler),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
