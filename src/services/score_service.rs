use crate::{
    dao::{models::ScoreDelta, store::Store},
    dto::leaderboard::LeaderboardEntry,
    error::ServiceError,
    state::SharedState,
};

/// Append a settlement batch to the ledger.
///
/// The batch is additive per user (insert-or-add); both parties of a game
/// settlement land in one storage call so readers never observe half a
/// settlement.
pub async fn add_scores(state: &SharedState, deltas: Vec<ScoreDelta>) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    store.add_scores(deltas).await?;
    Ok(())
}

/// Highest accumulated scores, bounded by the configured leaderboard limit.
pub async fn leaderboard(state: &SharedState) -> Result<Vec<LeaderboardEntry>, ServiceError> {
    let store = state.require_store().await?;
    let scores = store
        .top_scores(state.config().leaderboard_limit())
        .await?;
    Ok(scores.into_iter().map(Into::into).collect())
}
