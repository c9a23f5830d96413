use axum::{Json, Router, extract::State, routing::get};

use crate::{
    auth::Identity,
    dto::leaderboard::LeaderboardEntry,
    error::AppError,
    services::score_service,
    state::SharedState,
};

/// Routes exposing the score ledger.
pub fn router() -> Router<SharedState> {
    Router::new().route("/leaderboard", get(get_leaderboard))
}

#[utoipa::path(
    get,
    path = "/leaderboard",
    tag = "leaderboard",
    responses((status = 200, description = "Highest scores, descending", body = [LeaderboardEntry]))
)]
/// Read the highest accumulated scores.
pub async fn get_leaderboard(
    State(state): State<SharedState>,
    _identity: Identity,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let entries = score_service::leaderboard(&state).await?;
    Ok(Json(entries))
}
