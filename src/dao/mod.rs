//! Persistence layer: entities, the storage trait, and its backends.

/// Always-available in-memory storage backend.
pub mod memory;
/// Database model definitions.
pub mod models;
/// MongoDB storage backend.
#[cfg(feature = "mongo-store")]
pub mod mongodb;
/// Persistence trait consumed by the service layer.
pub mod store;
/// Storage abstraction layer for database operations.
pub mod storage;
