//! HTTP and WebSocket route trees.

use axum::Router;

use crate::state::SharedState;

/// Swagger documentation routes.
pub mod docs;
/// Game lifecycle routes.
pub mod game;
/// Health check routes.
pub mod health;
/// Leaderboard routes.
pub mod leaderboard;
/// Messaging routes.
pub mod message;
/// WebSocket admission route.
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(message::router())
        .merge(game::router())
        .merge(leaderboard::router())
        .merge(websocket::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
