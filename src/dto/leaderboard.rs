use serde::Serialize;
use utoipa::ToSchema;

use crate::dao::models::ScoreEntity;

/// One leaderboard row.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// Identity of the scored user.
    pub user_id: String,
    /// Accumulated score.
    pub score: i64,
    /// Last time the score changed, seconds since the Unix epoch.
    pub last_updated: i64,
}

impl From<ScoreEntity> for LeaderboardEntry {
    fn from(value: ScoreEntity) -> Self {
        Self {
            user_id: value.user_id,
            score: value.score,
            last_updated: value.last_updated,
        }
    }
}
