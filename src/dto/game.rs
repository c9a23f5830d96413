use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::{GameEntity, vote_code},
    dto::validation::{validate_user_id, validate_vote},
};

/// Payload for inviting another user to a game.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateGameRequest {
    /// Identity of the invited user.
    pub receiver: String,
}

impl Validate for CreateGameRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_user_id(&self.receiver) {
            errors.add("receiver", e);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Payload for casting a vote in an open game.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VoteRequest {
    /// Identifier of the game being voted on.
    pub game_id: i64,
    /// Vote wire code: `1` agree, `-1` disagree.
    pub vote: i8,
}

impl Validate for VoteRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_vote(self.vote) {
            errors.add("vote", e);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// A game as returned by the API and pushed in WebSocket events.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameView {
    /// Surrogate key of the game.
    pub id: i64,
    /// Identity of the user who created the game.
    pub sender: String,
    /// Identity of the invited user.
    pub receiver: String,
    /// Creation time, seconds since the Unix epoch.
    pub created: i64,
    /// Sender vote code, `0` while unset.
    pub svote: i8,
    /// Receiver vote code, `0` while unset.
    pub rvote: i8,
    /// Lifecycle status, `open` or `closed`.
    pub status: String,
}

impl From<GameEntity> for GameView {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id,
            sender: value.sender,
            receiver: value.receiver,
            created: value.created_at,
            svote: vote_code(value.svote),
            rvote: vote_code(value.rvote),
            status: value.status.as_str().to_owned(),
        }
    }
}
