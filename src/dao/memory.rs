use std::{collections::HashMap, sync::Arc};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::sync::Mutex;

use crate::dao::{
    models::{
        DeviceEntity, DeviceStatus, GameEntity, GameStatus, MessageEntity, NewMessage, ScoreDelta,
        ScoreEntity, Vote, VoteSlot,
    },
    storage::StorageResult,
    store::Store,
};

/// In-memory storage backend.
///
/// All tables live behind a single mutex, which is what gives the conditional
/// vote/close operations their exactly-once semantics and makes a settlement
/// batch atomic with respect to readers. Used as the default backend when no
/// database is configured and as the backend for service-level tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Tables>>,
}

#[derive(Default)]
struct Tables {
    messages: Vec<MessageEntity>,
    next_message_id: i64,
    games: HashMap<i64, GameEntity>,
    next_game_id: i64,
    scores: IndexMap<String, ScoreEntity>,
    devices: HashMap<String, DeviceEntity>,
    users_seen: HashMap<String, i64>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn insert_message(
        &self,
        message: NewMessage,
    ) -> BoxFuture<'static, StorageResult<MessageEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            tables.next_message_id += 1;
            let entity = MessageEntity {
                id: tables.next_message_id,
                sender: message.sender,
                receiver: message.receiver,
                content: message.content,
                created_at: message.created_at,
                delivered: false,
            };
            tables.messages.push(entity.clone());
            Ok(entity)
        })
    }

    fn mark_delivered_through(
        &self,
        sender: String,
        receiver: String,
        through: i64,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            let mut flipped = 0;
            for message in tables.messages.iter_mut() {
                if !message.delivered
                    && message.sender == sender
                    && message.receiver == receiver
                    && message.created_at <= through
                {
                    message.delivered = true;
                    flipped += 1;
                }
            }
            Ok(flipped)
        })
    }

    fn messages_for(
        &self,
        receiver: String,
        since: i64,
    ) -> BoxFuture<'static, StorageResult<Vec<MessageEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let tables = store.inner.lock().await;
            let mut messages: Vec<MessageEntity> = tables
                .messages
                .iter()
                .filter(|m| m.receiver == receiver && m.created_at > since)
                .cloned()
                .collect();
            messages.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(messages)
        })
    }

    fn insert_game(
        &self,
        sender: String,
        receiver: String,
        created_at: i64,
    ) -> BoxFuture<'static, StorageResult<GameEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            tables.next_game_id += 1;
            let entity = GameEntity {
                id: tables.next_game_id,
                sender,
                receiver,
                created_at,
                svote: None,
                rvote: None,
                status: GameStatus::Open,
            };
            tables.games.insert(entity.id, entity.clone());
            Ok(entity)
        })
    }

    fn find_game(&self, id: i64) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let tables = store.inner.lock().await;
            Ok(tables.games.get(&id).cloned())
        })
    }

    fn write_vote(
        &self,
        id: i64,
        slot: VoteSlot,
        vote: Vote,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            let Some(game) = tables.games.get_mut(&id) else {
                return Ok(None);
            };
            if game.status != GameStatus::Open {
                return Ok(None);
            }
            let target = match slot {
                VoteSlot::Sender => &mut game.svote,
                VoteSlot::Receiver => &mut game.rvote,
            };
            if target.is_some() {
                return Ok(None);
            }
            *target = Some(vote);
            Ok(Some(game.clone()))
        })
    }

    fn close_game(
        &self,
        id: i64,
        fallback: Vote,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            let Some(game) = tables.games.get_mut(&id) else {
                return Ok(None);
            };
            if game.status != GameStatus::Open {
                return Ok(None);
            }
            game.svote.get_or_insert(fallback);
            game.rvote.get_or_insert(fallback);
            game.status = GameStatus::Closed;
            Ok(Some(game.clone()))
        })
    }

    fn open_games_for(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let tables = store.inner.lock().await;
            let mut games: Vec<GameEntity> = tables
                .games
                .values()
                .filter(|g| {
                    g.status == GameStatus::Open && (g.sender == user_id || g.receiver == user_id)
                })
                .cloned()
                .collect();
            games.sort_by_key(|g| g.id);
            Ok(games)
        })
    }

    fn list_open_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let tables = store.inner.lock().await;
            let mut games: Vec<GameEntity> = tables
                .games
                .values()
                .filter(|g| g.status == GameStatus::Open)
                .cloned()
                .collect();
            games.sort_by_key(|g| g.id);
            Ok(games)
        })
    }

    fn add_scores(&self, deltas: Vec<ScoreDelta>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            // One lock acquisition for the whole batch: both parties of a
            // settlement become visible to readers together.
            let mut tables = store.inner.lock().await;
            for delta in deltas {
                let row = tables
                    .scores
                    .entry(delta.user_id.clone())
                    .or_insert_with(|| ScoreEntity {
                        user_id: delta.user_id.clone(),
                        score: 0,
                        last_updated: delta.timestamp,
                    });
                row.score += delta.delta;
                row.last_updated = delta.timestamp;
            }
            Ok(())
        })
    }

    fn top_scores(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let tables = store.inner.lock().await;
            let mut scores: Vec<ScoreEntity> = tables.scores.values().cloned().collect();
            // Stable sort keeps first-contribution order for equal scores.
            scores.sort_by(|a, b| b.score.cmp(&a.score));
            scores.truncate(limit);
            Ok(scores)
        })
    }

    fn upsert_device(&self, device: DeviceEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            tables.devices.insert(device.id.clone(), device);
            Ok(())
        })
    }

    fn mark_device_offline(
        &self,
        device_id: String,
        now: i64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            if let Some(device) = tables.devices.get_mut(&device_id) {
                device.status = DeviceStatus::Offline;
                device.last_seen = now;
            }
            Ok(())
        })
    }

    fn touch_user(&self, user_id: String, now: i64) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            tables.users_seen.insert(user_id, now);
            Ok(())
        })
    }

    fn sweep_stale_devices(&self, cutoff: i64) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            let mut swept = 0;
            for device in tables.devices.values_mut() {
                if device.status == DeviceStatus::Online && device.last_seen < cutoff {
                    device.status = DeviceStatus::Offline;
                    swept += 1;
                }
            }
            Ok(swept)
        })
    }

    fn reset_devices(&self) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let mut tables = store.inner.lock().await;
            let mut reset = 0;
            for device in tables.devices.values_mut() {
                if device.status == DeviceStatus::Online {
                    device.status = DeviceStatus::Offline;
                    reset += 1;
                }
            }
            Ok(reset)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn online(id: &str, user: &str, last_seen: i64) -> DeviceEntity {
        DeviceEntity {
            id: id.into(),
            user_id: user.into(),
            last_seen,
            status: DeviceStatus::Online,
            user_agent: None,
        }
    }

    #[tokio::test]
    async fn message_ids_are_monotonic() {
        let store = MemoryStore::new();
        let first = store
            .insert_message(NewMessage {
                sender: "a".into(),
                receiver: "b".into(),
                content: "one".into(),
                created_at: 10,
            })
            .await
            .unwrap();
        let second = store
            .insert_message(NewMessage {
                sender: "a".into(),
                receiver: "b".into(),
                content: "two".into(),
                created_at: 11,
            })
            .await
            .unwrap();
        assert!(second.id > first.id);
        assert!(!first.delivered);
    }

    #[tokio::test]
    async fn messages_for_filters_and_orders_newest_first() {
        let store = MemoryStore::new();
        for (content, created_at) in [("old", 5), ("mid", 10), ("new", 20)] {
            store
                .insert_message(NewMessage {
                    sender: "a".into(),
                    receiver: "b".into(),
                    content: content.into(),
                    created_at,
                })
                .await
                .unwrap();
        }
        store
            .insert_message(NewMessage {
                sender: "a".into(),
                receiver: "c".into(),
                content: "other".into(),
                created_at: 30,
            })
            .await
            .unwrap();

        let all = store.messages_for("b".into(), 0).await.unwrap();
        assert_eq!(
            all.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(),
            ["new", "mid", "old"]
        );

        let recent = store.messages_for("b".into(), 5).await.unwrap();
        assert_eq!(recent.len(), 2, "since filter is strict");
    }

    #[tokio::test]
    async fn delivered_flag_is_monotonic_and_batched() {
        let store = MemoryStore::new();
        for created_at in [1, 2, 3] {
            store
                .insert_message(NewMessage {
                    sender: "a".into(),
                    receiver: "b".into(),
                    content: "hey".into(),
                    created_at,
                })
                .await
                .unwrap();
        }
        store
            .insert_message(NewMessage {
                sender: "a".into(),
                receiver: "b".into(),
                content: "later".into(),
                created_at: 9,
            })
            .await
            .unwrap();

        let flipped = store
            .mark_delivered_through("a".into(), "b".into(), 3)
            .await
            .unwrap();
        assert_eq!(flipped, 3);

        let again = store
            .mark_delivered_through("a".into(), "b".into(), 3)
            .await
            .unwrap();
        assert_eq!(again, 0, "already-delivered rows are not flipped back");

        let messages = store.messages_for("b".into(), 0).await.unwrap();
        assert!(messages.iter().filter(|m| m.created_at <= 3).all(|m| m.delivered));
        assert!(!messages.iter().find(|m| m.created_at == 9).unwrap().delivered);
    }

    #[tokio::test]
    async fn vote_slot_accepts_exactly_one_write() {
        let store = MemoryStore::new();
        let game = store
            .insert_game("a".into(), "b".into(), 100)
            .await
            .unwrap();

        let first = store
            .write_vote(game.id, VoteSlot::Sender, Vote::Agree)
            .await
            .unwrap();
        assert_eq!(first.unwrap().svote, Some(Vote::Agree));

        let second = store
            .write_vote(game.id, VoteSlot::Sender, Vote::Disagree)
            .await
            .unwrap();
        assert!(second.is_none(), "occupied slot rejects the second writer");

        let reloaded = store.find_game(game.id).await.unwrap().unwrap();
        assert_eq!(reloaded.svote, Some(Vote::Agree), "losing write left no trace");
    }

    #[tokio::test]
    async fn concurrent_votes_for_same_slot_have_a_single_winner() {
        let store = MemoryStore::new();
        let game = store
            .insert_game("a".into(), "b".into(), 100)
            .await
            .unwrap();

        let (left, right) = tokio::join!(
            store.write_vote(game.id, VoteSlot::Receiver, Vote::Agree),
            store.write_vote(game.id, VoteSlot::Receiver, Vote::Disagree),
        );
        let winners = [left.unwrap(), right.unwrap()]
            .into_iter()
            .flatten()
            .count();
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn close_game_wins_once_and_fills_unset_slots() {
        let store = MemoryStore::new();
        let game = store
            .insert_game("a".into(), "b".into(), 100)
            .await
            .unwrap();
        store
            .write_vote(game.id, VoteSlot::Sender, Vote::Agree)
            .await
            .unwrap();

        let closed = store
            .close_game(game.id, Vote::Disagree)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(closed.status, GameStatus::Closed);
        assert_eq!(closed.svote, Some(Vote::Agree), "set slot untouched");
        assert_eq!(closed.rvote, Some(Vote::Disagree), "unset slot resolved");

        let replay = store.close_game(game.id, Vote::Disagree).await.unwrap();
        assert!(replay.is_none(), "second close loses the transition");

        let vote_after_close = store
            .write_vote(game.id, VoteSlot::Receiver, Vote::Agree)
            .await
            .unwrap();
        assert!(vote_after_close.is_none());
    }

    #[tokio::test]
    async fn open_games_listings_exclude_closed_games() {
        let store = MemoryStore::new();
        let open = store.insert_game("a".into(), "b".into(), 1).await.unwrap();
        let settled = store.insert_game("b".into(), "c".into(), 2).await.unwrap();
        store
            .close_game(settled.id, Vote::Disagree)
            .await
            .unwrap();

        let for_b = store.open_games_for("b".into()).await.unwrap();
        assert_eq!(for_b.iter().map(|g| g.id).collect::<Vec<_>>(), [open.id]);
        assert_eq!(store.list_open_games().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn scores_accumulate_additively() {
        let store = MemoryStore::new();
        store
            .add_scores(vec![
                ScoreDelta {
                    user_id: "a".into(),
                    delta: 3,
                    timestamp: 10,
                },
                ScoreDelta {
                    user_id: "b".into(),
                    delta: 3,
                    timestamp: 10,
                },
            ])
            .await
            .unwrap();
        store
            .add_scores(vec![ScoreDelta {
                user_id: "a".into(),
                delta: 5,
                timestamp: 20,
            }])
            .await
            .unwrap();

        let top = store.top_scores(10).await.unwrap();
        assert_eq!(top[0].user_id, "a");
        assert_eq!(top[0].score, 8);
        assert_eq!(top[0].last_updated, 20);
        assert_eq!(top[1].score, 3);
    }

    #[tokio::test]
    async fn leaderboard_ties_keep_first_scored_order() {
        let store = MemoryStore::new();
        for user in ["first", "second", "third"] {
            store
                .add_scores(vec![ScoreDelta {
                    user_id: user.into(),
                    delta: 1,
                    timestamp: 1,
                }])
                .await
                .unwrap();
        }
        let top = store.top_scores(2).await.unwrap();
        assert_eq!(
            top.iter().map(|s| s.user_id.as_str()).collect::<Vec<_>>(),
            ["first", "second"]
        );
    }

    #[tokio::test]
    async fn sweep_marks_only_stale_online_devices() {
        let store = MemoryStore::new();
        store
            .upsert_device(online("stale", "a", 100))
            .await
            .unwrap();
        store
            .upsert_device(online("fresh", "b", 900))
            .await
            .unwrap();
        let mut closed = online("closed", "c", 100);
        closed.status = DeviceStatus::Offline;
        store.upsert_device(closed).await.unwrap();

        let swept = store.sweep_stale_devices(500).await.unwrap();
        assert_eq!(swept, 1, "only the stale online device is swept");
        let again = store.sweep_stale_devices(500).await.unwrap();
        assert_eq!(again, 0);
    }

    #[tokio::test]
    async fn reset_forces_every_device_offline() {
        let store = MemoryStore::new();
        store
            .upsert_device(online("one", "a", 100))
            .await
            .unwrap();
        store
            .upsert_device(online("two", "b", 200))
            .await
            .unwrap();

        assert_eq!(store.reset_devices().await.unwrap(), 2);
        assert_eq!(store.reset_devices().await.unwrap(), 0);
    }
}
