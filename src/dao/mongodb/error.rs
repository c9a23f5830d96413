use mongodb::error::Error as MongoError;
use thiserror::Error;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures raised by the MongoDB backend, one variant per operation family.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to allocate the next id in sequence `{sequence}`")]
    NextId {
        sequence: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to save message from `{sender}`")]
    SaveMessage {
        sender: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to reconcile delivered flags for `{receiver}`")]
    MarkDelivered {
        receiver: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load messages for `{receiver}`")]
    LoadMessages {
        receiver: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to save game `{id}`")]
    SaveGame {
        id: i64,
        #[source]
        source: MongoError,
    },
    #[error("failed to load game `{id}`")]
    LoadGame {
        id: i64,
        #[source]
        source: MongoError,
    },
    #[error("failed to update game `{id}`")]
    UpdateGame {
        id: i64,
        #[source]
        source: MongoError,
    },
    #[error("failed to list open games")]
    ListGames {
        #[source]
        source: MongoError,
    },
    #[error("failed to upsert score for `{user_id}`")]
    UpsertScore {
        user_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load the leaderboard")]
    LoadScores {
        #[source]
        source: MongoError,
    },
    #[error("failed to update presence for device `{device_id}`")]
    UpdateDevice {
        device_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to update presence for user `{user_id}`")]
    UpdateUser {
        user_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to sweep stale devices")]
    SweepDevices {
        #[source]
        source: MongoError,
    },
}
