use serde::{Deserialize, Serialize};

use crate::dao::models::{
    DeviceEntity, GameEntity, GameStatus, MessageEntity, NewMessage, ScoreEntity, Vote, vote_code,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDocument {
    #[serde(rename = "_id")]
    pub id: i64,
    pub sender: String,
    pub receiver: String,
    pub content: String,
    pub created_at: i64,
    pub delivered: bool,
}

impl MessageDocument {
    pub fn new(id: i64, message: NewMessage) -> Self {
        Self {
            id,
            sender: message.sender,
            receiver: message.receiver,
            content: message.content,
            created_at: message.created_at,
            delivered: false,
        }
    }
}

impl From<MessageDocument> for MessageEntity {
    fn from(value: MessageDocument) -> Self {
        Self {
            id: value.id,
            sender: value.sender,
            receiver: value.receiver,
            content: value.content,
            created_at: value.created_at,
            delivered: value.delivered,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameDocument {
    #[serde(rename = "_id")]
    pub id: i64,
    pub sender: String,
    pub receiver: String,
    pub created_at: i64,
    /// Vote codes use `0` for unset, matching the wire representation.
    pub svote: i32,
    pub rvote: i32,
    pub status: String,
}

impl From<GameEntity> for GameDocument {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id,
            sender: value.sender,
            receiver: value.receiver,
            created_at: value.created_at,
            svote: vote_code(value.svote) as i32,
            rvote: vote_code(value.rvote) as i32,
            status: value.status.as_str().to_owned(),
        }
    }
}

impl From<GameDocument> for GameEntity {
    fn from(value: GameDocument) -> Self {
        let status = if value.status == GameStatus::Closed.as_str() {
            GameStatus::Closed
        } else {
            GameStatus::Open
        };
        Self {
            id: value.id,
            sender: value.sender,
            receiver: value.receiver,
            created_at: value.created_at,
            svote: Vote::from_code(value.svote as i8),
            rvote: Vote::from_code(value.rvote as i8),
            status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreDocument {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub score: i64,
    pub last_updated: i64,
}

impl From<ScoreDocument> for ScoreEntity {
    fn from(value: ScoreDocument) -> Self {
        Self {
            user_id: value.user_id,
            score: value.score,
            last_updated: value.last_updated,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub last_seen: i64,
    pub status: String,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl From<DeviceEntity> for DeviceDocument {
    fn from(value: DeviceEntity) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            last_seen: value.last_seen,
            status: value.status.as_str().to_owned(),
            user_agent: value.user_agent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterDocument {
    #[serde(rename = "_id")]
    pub name: String,
    pub seq: i64,
}
