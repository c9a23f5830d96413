use futures::future::BoxFuture;

use crate::dao::models::{
    DeviceEntity, GameEntity, MessageEntity, NewMessage, ScoreDelta, ScoreEntity, Vote, VoteSlot,
};
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer for messages, games, scores, and presence.
///
/// The two conditional operations, [`Store::write_vote`] and [`Store::close_game`],
/// are the commit points arbitrating concurrent settlement: each succeeds for at
/// most one caller and returns `None` to everyone who lost the race.
pub trait Store: Send + Sync {
    /// Persist a message, assigning its monotonic surrogate key.
    fn insert_message(&self, message: NewMessage) -> BoxFuture<'static, StorageResult<MessageEntity>>;
    /// Mark every undelivered message from `sender` to `receiver` created at or
    /// before `through` as delivered. Returns the number of rows flipped.
    fn mark_delivered_through(
        &self,
        sender: String,
        receiver: String,
        through: i64,
    ) -> BoxFuture<'static, StorageResult<u64>>;
    /// Messages addressed to `receiver` created strictly after `since`, newest first.
    fn messages_for(
        &self,
        receiver: String,
        since: i64,
    ) -> BoxFuture<'static, StorageResult<Vec<MessageEntity>>>;

    /// Persist a fresh open game with both vote slots unset.
    fn insert_game(
        &self,
        sender: String,
        receiver: String,
        created_at: i64,
    ) -> BoxFuture<'static, StorageResult<GameEntity>>;
    /// Load a game by id.
    fn find_game(&self, id: i64) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Conditionally write `vote` into `slot`, succeeding only while the game is
    /// open and the slot is unset. Returns the updated game, or `None` when the
    /// condition no longer holds (lost race or closed game).
    fn write_vote(
        &self,
        id: i64,
        slot: VoteSlot,
        vote: Vote,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Conditionally transition the game from open to closed, resolving any
    /// still-unset vote slot to `fallback` in the same update. Returns the closed
    /// game when this caller won the transition, `None` when it was already closed.
    fn close_game(
        &self,
        id: i64,
        fallback: Vote,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Open games in which `user_id` is sender or receiver.
    fn open_games_for(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>>;
    /// Every open game, used to re-arm timeout settlement at startup.
    fn list_open_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>>;

    /// Apply a batch of additive score contributions (insert-or-add per user).
    fn add_scores(&self, deltas: Vec<ScoreDelta>) -> BoxFuture<'static, StorageResult<()>>;
    /// Highest accumulated scores, descending, ties stable by first contribution.
    fn top_scores(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>>;

    /// Upsert a device presence row, replacing status, last-seen, and descriptor.
    fn upsert_device(&self, device: DeviceEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Mark a device offline, refreshing last-seen.
    fn mark_device_offline(
        &self,
        device_id: String,
        now: i64,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Record user-level last-seen.
    fn touch_user(&self, user_id: String, now: i64) -> BoxFuture<'static, StorageResult<()>>;
    /// Mark online devices not seen since `cutoff` as offline. Returns how many
    /// devices were swept.
    fn sweep_stale_devices(&self, cutoff: i64) -> BoxFuture<'static, StorageResult<u64>>;
    /// Force every device offline, discarding flags from a previous process
    /// incarnation. Returns how many devices were reset.
    fn reset_devices(&self) -> BoxFuture<'static, StorageResult<u64>>;

    /// Cheap connectivity probe used by the supervisor and the health route.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Attempt to rebuild the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
