//! Business logic, one module per component.

use time::OffsetDateTime;

/// OpenAPI documentation generation.
pub mod documentation;
/// Game lifecycle: invites, votes, settlement, timeouts.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Message persistence and best-effort realtime delivery.
pub mod message_service;
/// Device and user presence tracking.
pub mod presence_service;
/// Fire-and-forget push notification side channel.
pub mod push_service;
/// Score ledger reads and writes.
pub mod score_service;
/// Storage persistence coordinator with reconnect backoff.
pub mod storage_supervisor;
/// WebSocket connection lifecycle handling.
pub mod websocket_service;

/// Current wall-clock time in seconds since the Unix epoch.
pub(crate) fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}
