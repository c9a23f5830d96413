use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Document, doc},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{CounterDocument, DeviceDocument, GameDocument, MessageDocument, ScoreDocument},
};
use crate::dao::{
    models::{
        DeviceEntity, DeviceStatus, GameEntity, GameStatus, MessageEntity, NewMessage, ScoreDelta,
        ScoreEntity, Vote, VoteSlot,
    },
    storage::StorageResult,
    store::Store,
};

const MESSAGE_COLLECTION: &str = "messages";
const GAME_COLLECTION: &str = "games";
const SCORE_COLLECTION: &str = "scores";
const DEVICE_COLLECTION: &str = "devices";
const USER_COLLECTION: &str = "users";
const COUNTER_COLLECTION: &str = "counters";

/// MongoDB implementation of [`Store`].
///
/// Vote writes and game closure go through `find_one_and_update` with filters
/// that re-state the precondition (`status == open`, slot unset), so the
/// database arbitrates settlement races the same way the in-memory backend's
/// table lock does.
#[derive(Clone)]
pub struct MongoStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let messages = database.collection::<Document>(MESSAGE_COLLECTION);
        let index = IndexModel::builder()
            .keys(doc! { "receiver": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name(Some("message_inbox_idx".to_owned()))
                    .build(),
            )
            .build();
        messages
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: MESSAGE_COLLECTION,
                index: "receiver,created_at",
                source,
            })?;

        let games = database.collection::<Document>(GAME_COLLECTION);
        for (name, keys) in [
            ("game_sender_idx", doc! { "status": 1, "sender": 1 }),
            ("game_receiver_idx", doc! { "status": 1, "receiver": 1 }),
        ] {
            let index = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().name(Some(name.to_owned())).build())
                .build();
            games
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: GAME_COLLECTION,
                    index: "status,party",
                    source,
                })?;
        }

        let scores = database.collection::<Document>(SCORE_COLLECTION);
        let index = IndexModel::builder()
            .keys(doc! { "score": -1 })
            .options(
                IndexOptions::builder()
                    .name(Some("score_rank_idx".to_owned()))
                    .build(),
            )
            .build();
        scores
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SCORE_COLLECTION,
                index: "score",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn messages(&self) -> Collection<MessageDocument> {
        self.database().await.collection(MESSAGE_COLLECTION)
    }

    async fn games(&self) -> Collection<GameDocument> {
        self.database().await.collection(GAME_COLLECTION)
    }

    async fn scores(&self) -> Collection<ScoreDocument> {
        self.database().await.collection(SCORE_COLLECTION)
    }

    async fn devices(&self) -> Collection<DeviceDocument> {
        self.database().await.collection(DEVICE_COLLECTION)
    }

    async fn counters(&self) -> Collection<CounterDocument> {
        self.database().await.collection(COUNTER_COLLECTION)
    }

    /// Allocate the next value of a named monotonic sequence.
    async fn next_id(&self, sequence: &'static str) -> MongoResult<i64> {
        let counter = self
            .counters()
            .await
            .find_one_and_update(
                doc! { "_id": sequence },
                doc! { "$inc": { "seq": 1_i64 } },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::NextId { sequence, source })?;

        // The upsert guarantees a document comes back.
        Ok(counter.map(|c| c.seq).unwrap_or(1))
    }

    async fn insert_message(&self, message: NewMessage) -> MongoResult<MessageEntity> {
        let sender = message.sender.clone();
        let id = self.next_id(MESSAGE_COLLECTION).await?;
        let document = MessageDocument::new(id, message);
        self.messages()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::SaveMessage { sender, source })?;
        Ok(document.into())
    }

    async fn mark_delivered_through(
        &self,
        sender: String,
        receiver: String,
        through: i64,
    ) -> MongoResult<u64> {
        let result = self
            .messages()
            .await
            .update_many(
                doc! {
                    "sender": &sender,
                    "receiver": &receiver,
                    "delivered": false,
                    "created_at": { "$lte": through },
                },
                doc! { "$set": { "delivered": true } },
            )
            .await
            .map_err(|source| MongoDaoError::MarkDelivered { receiver, source })?;
        Ok(result.modified_count)
    }

    async fn messages_for(&self, receiver: String, since: i64) -> MongoResult<Vec<MessageEntity>> {
        let documents: Vec<MessageDocument> = self
            .messages()
            .await
            .find(doc! { "receiver": &receiver, "created_at": { "$gt": since } })
            .sort(doc! { "created_at": -1, "_id": -1 })
            .await
            .map_err(|source| MongoDaoError::LoadMessages {
                receiver: receiver.clone(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadMessages { receiver, source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn insert_game(
        &self,
        sender: String,
        receiver: String,
        created_at: i64,
    ) -> MongoResult<GameEntity> {
        let id = self.next_id(GAME_COLLECTION).await?;
        let entity = GameEntity {
            id,
            sender,
            receiver,
            created_at,
            svote: None,
            rvote: None,
            status: GameStatus::Open,
        };
        let document: GameDocument = entity.clone().into();
        self.games()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::SaveGame { id, source })?;
        Ok(entity)
    }

    async fn find_game(&self, id: i64) -> MongoResult<Option<GameEntity>> {
        let document = self
            .games()
            .await
            .find_one(doc! { "_id": id })
            .await
            .map_err(|source| MongoDaoError::LoadGame { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn write_vote(
        &self,
        id: i64,
        slot: VoteSlot,
        vote: Vote,
    ) -> MongoResult<Option<GameEntity>> {
        let field = match slot {
            VoteSlot::Sender => "svote",
            VoteSlot::Receiver => "rvote",
        };
        let mut filter = doc! { "_id": id, "status": GameStatus::Open.as_str() };
        filter.insert(field, 0_i32);
        let mut set = Document::new();
        set.insert(field, vote.code() as i32);

        let document = self
            .games()
            .await
            .find_one_and_update(filter, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::UpdateGame { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn close_game(&self, id: i64, fallback: Vote) -> MongoResult<Option<GameEntity>> {
        let fallback_code = fallback.code() as i32;
        // Pipeline update: flip the status and resolve unset slots in one
        // conditional write, so the open -> closed transition commits at most once.
        let update = vec![doc! {
            "$set": {
                "status": GameStatus::Closed.as_str(),
                "svote": { "$cond": [{ "$eq": ["$svote", 0] }, fallback_code, "$svote"] },
                "rvote": { "$cond": [{ "$eq": ["$rvote", 0] }, fallback_code, "$rvote"] },
            }
        }];

        let document = self
            .games()
            .await
            .find_one_and_update(doc! { "_id": id, "status": GameStatus::Open.as_str() }, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::UpdateGame { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn open_games(&self, filter: Document) -> MongoResult<Vec<GameEntity>> {
        let documents: Vec<GameDocument> = self
            .games()
            .await
            .find(filter)
            .sort(doc! { "_id": 1 })
            .await
            .map_err(|source| MongoDaoError::ListGames { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListGames { source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn add_scores(&self, deltas: Vec<ScoreDelta>) -> MongoResult<()> {
        let scores = self.scores().await;
        for delta in deltas {
            scores
                .update_one(
                    doc! { "_id": &delta.user_id },
                    doc! {
                        "$inc": { "score": delta.delta },
                        "$set": { "last_updated": delta.timestamp },
                    },
                )
                .upsert(true)
                .await
                .map_err(|source| MongoDaoError::UpsertScore {
                    user_id: delta.user_id.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    async fn top_scores(&self, limit: usize) -> MongoResult<Vec<ScoreEntity>> {
        let documents: Vec<ScoreDocument> = self
            .scores()
            .await
            .find(doc! {})
            .sort(doc! { "score": -1, "_id": 1 })
            .limit(limit as i64)
            .await
            .map_err(|source| MongoDaoError::LoadScores { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadScores { source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn upsert_device(&self, device: DeviceEntity) -> MongoResult<()> {
        let document: DeviceDocument = device.into();
        let mut fields = doc! {
            "user_id": &document.user_id,
            "last_seen": document.last_seen,
            "status": &document.status,
        };
        match &document.user_agent {
            Some(agent) => fields.insert("user_agent", agent.clone()),
            None => fields.insert("user_agent", mongodb::bson::Bson::Null),
        };
        self.devices()
            .await
            .update_one(doc! { "_id": &document.id }, doc! { "$set": fields })
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::UpdateDevice {
                device_id: document.id.clone(),
                source,
            })?;
        Ok(())
    }

    async fn mark_device_offline(&self, device_id: String, now: i64) -> MongoResult<()> {
        self.devices()
            .await
            .update_one(
                doc! { "_id": &device_id },
                doc! { "$set": {
                    "status": DeviceStatus::Offline.as_str(),
                    "last_seen": now,
                }},
            )
            .await
            .map_err(|source| MongoDaoError::UpdateDevice { device_id, source })?;
        Ok(())
    }

    async fn touch_user(&self, user_id: String, now: i64) -> MongoResult<()> {
        self.database()
            .await
            .collection::<Document>(USER_COLLECTION)
            .update_one(
                doc! { "_id": &user_id },
                doc! { "$set": { "last_seen": now } },
            )
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::UpdateUser { user_id, source })?;
        Ok(())
    }

    async fn sweep_stale_devices(&self, cutoff: i64) -> MongoResult<u64> {
        let result = self
            .devices()
            .await
            .update_many(
                doc! {
                    "status": DeviceStatus::Online.as_str(),
                    "last_seen": { "$lt": cutoff },
                },
                doc! { "$set": { "status": DeviceStatus::Offline.as_str() } },
            )
            .await
            .map_err(|source| MongoDaoError::SweepDevices { source })?;
        Ok(result.modified_count)
    }

    async fn reset_devices(&self) -> MongoResult<u64> {
        let result = self
            .devices()
            .await
            .update_many(
                doc! { "status": DeviceStatus::Online.as_str() },
                doc! { "$set": { "status": DeviceStatus::Offline.as_str() } },
            )
            .await
            .map_err(|source| MongoDaoError::SweepDevices { source })?;
        Ok(result.modified_count)
    }
}

impl Store for MongoStore {
    fn insert_message(
        &self,
        message: NewMessage,
    ) -> BoxFuture<'static, StorageResult<MessageEntity>> {
        let store = self.clone();
        Box::pin(async move { store.insert_message(message).await.map_err(Into::into) })
    }

    fn mark_delivered_through(
        &self,
        sender: String,
        receiver: String,
        through: i64,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .mark_delivered_through(sender, receiver, through)
                .await
                .map_err(Into::into)
        })
    }

    fn messages_for(
        &self,
        receiver: String,
        since: i64,
    ) -> BoxFuture<'static, StorageResult<Vec<MessageEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.messages_for(receiver, since).await.map_err(Into::into) })
    }

    fn insert_game(
        &self,
        sender: String,
        receiver: String,
        created_at: i64,
    ) -> BoxFuture<'static, StorageResult<GameEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .insert_game(sender, receiver, created_at)
                .await
                .map_err(Into::into)
        })
    }

    fn find_game(&self, id: i64) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_game(id).await.map_err(Into::into) })
    }

    fn write_vote(
        &self,
        id: i64,
        slot: VoteSlot,
        vote: Vote,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.write_vote(id, slot, vote).await.map_err(Into::into) })
    }

    fn close_game(
        &self,
        id: i64,
        fallback: Vote,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.close_game(id, fallback).await.map_err(Into::into) })
    }

    fn open_games_for(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .open_games(doc! {
                    "status": GameStatus::Open.as_str(),
                    "$or": [{ "sender": &user_id }, { "receiver": &user_id }],
                })
                .await
                .map_err(Into::into)
        })
    }

    fn list_open_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .open_games(doc! { "status": GameStatus::Open.as_str() })
                .await
                .map_err(Into::into)
        })
    }

    fn add_scores(&self, deltas: Vec<ScoreDelta>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.add_scores(deltas).await.map_err(Into::into) })
    }

    fn top_scores(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.top_scores(limit).await.map_err(Into::into) })
    }

    fn upsert_device(&self, device: DeviceEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.upsert_device(device).await.map_err(Into::into) })
    }

    fn mark_device_offline(
        &self,
        device_id: String,
        now: i64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .mark_device_offline(device_id, now)
                .await
                .map_err(Into::into)
        })
    }

    fn touch_user(&self, user_id: String, now: i64) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.touch_user(user_id, now).await.map_err(Into::into) })
    }

    fn sweep_stale_devices(&self, cutoff: i64) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.sweep_stale_devices(cutoff).await.map_err(Into::into) })
    }

    fn reset_devices(&self) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.reset_devices().await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
