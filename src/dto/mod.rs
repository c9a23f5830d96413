//! Request, response, and event payloads exchanged with clients.

/// Game lifecycle payloads.
pub mod game;
/// Health check payloads.
pub mod health;
/// Leaderboard payloads.
pub mod leaderboard;
/// Messaging payloads.
pub mod message;
/// Validation helpers for DTOs.
pub mod validation;
/// Events pushed over WebSocket connections.
pub mod ws;
