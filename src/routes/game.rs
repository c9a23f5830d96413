use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use validator::Validate;

use crate::{
    auth::Identity,
    dto::game::{CreateGameRequest, GameView, VoteRequest},
    error::AppError,
    services::game_service,
    state::SharedState,
};

/// Routes handling game creation, voting, and listing.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", post(create_game))
        .route("/games/vote", post(handle_vote))
        .route("/games/active", get(get_active_games))
}

#[utoipa::path(
    post,
    path = "/games",
    tag = "game",
    request_body = CreateGameRequest,
    responses(
        (status = 201, description = "Game created", body = GameView),
        (status = 400, description = "Malformed receiver identity"),
    )
)]
/// Create a game and invite the receiver.
pub async fn create_game(
    State(state): State<SharedState>,
    identity: Identity,
    Json(payload): Json<CreateGameRequest>,
) -> Result<(StatusCode, Json<GameView>), AppError> {
    payload.validate()?;
    let game = game_service::create_game(&state, &identity.user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(game)))
}

#[utoipa::path(
    post,
    path = "/games/vote",
    tag = "game",
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Vote recorded; game returned with current state", body = GameView),
        (status = 403, description = "Caller is not a participant"),
        (status = 404, description = "Unknown game"),
        (status = 409, description = "Game closed or slot already voted"),
    )
)]
/// Cast a vote in an open game the caller participates in.
pub async fn handle_vote(
    State(state): State<SharedState>,
    identity: Identity,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<GameView>, AppError> {
    payload.validate()?;
    let game = game_service::handle_vote(&state, &identity.user_id, payload).await?;
    Ok(Json(game))
}

#[utoipa::path(
    get,
    path = "/games/active",
    tag = "game",
    responses((status = 200, description = "Open games for the caller", body = [GameView]))
)]
/// List open games in which the caller participates.
pub async fn get_active_games(
    State(state): State<SharedState>,
    identity: Identity,
) -> Result<Json<Vec<GameView>>, AppError> {
    let games = game_service::active_games(&state, &identity.user_id).await?;
    Ok(Json(games))
}
