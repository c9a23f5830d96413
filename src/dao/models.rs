use serde::{Deserialize, Serialize};

/// A single point-to-point message persisted by the message service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageEntity {
    /// Monotonic surrogate key assigned by the backend.
    pub id: i64,
    /// Identity of the sending user.
    pub sender: String,
    /// Identity of the receiving user.
    pub receiver: String,
    /// Message body, bounded by the service layer.
    pub content: String,
    /// Creation time, seconds since the Unix epoch.
    pub created_at: i64,
    /// Whether the message was written to the receiver's live connection at least once.
    pub delivered: bool,
}

/// Fields of a message not yet assigned a surrogate key.
#[derive(Debug, Clone)]
pub struct NewMessage {
    /// Identity of the sending user.
    pub sender: String,
    /// Identity of the receiving user.
    pub receiver: String,
    /// Message body.
    pub content: String,
    /// Creation time, seconds since the Unix epoch.
    pub created_at: i64,
}

/// A vote cast by one of the two parties of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    /// Positive vote (+1 on the wire).
    Agree,
    /// Negative vote (-1 on the wire).
    Disagree,
}

impl Vote {
    /// Wire representation of the vote.
    pub fn code(self) -> i8 {
        match self {
            Vote::Agree => 1,
            Vote::Disagree => -1,
        }
    }

    /// Parse a wire code, accepting only `1` and `-1`.
    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            1 => Some(Vote::Agree),
            -1 => Some(Vote::Disagree),
            _ => None,
        }
    }
}

/// Wire/storage representation of an optional vote, `0` meaning unset.
pub fn vote_code(vote: Option<Vote>) -> i8 {
    vote.map(Vote::code).unwrap_or(0)
}

/// Which of the two vote slots of a game a write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteSlot {
    /// The slot owned by the game creator.
    Sender,
    /// The slot owned by the invited party.
    Receiver,
}

/// Lifecycle status of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    /// Votes may still be cast.
    Open,
    /// Settled, either voluntarily or by timeout.
    Closed,
}

impl GameStatus {
    /// Storage/wire representation of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::Open => "open",
            GameStatus::Closed => "closed",
        }
    }
}

/// A two-party voting game persisted by the game service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameEntity {
    /// Surrogate key assigned by the backend.
    pub id: i64,
    /// Identity of the user who created the game.
    pub sender: String,
    /// Identity of the invited user.
    pub receiver: String,
    /// Creation time, seconds since the Unix epoch.
    pub created_at: i64,
    /// Vote cast by the sender, if any. Once set, never changes.
    pub svote: Option<Vote>,
    /// Vote cast by the receiver, if any. Once set, never changes.
    pub rvote: Option<Vote>,
    /// Current lifecycle status.
    pub status: GameStatus,
}

/// Accumulated score row, one per user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreEntity {
    /// Identity of the scored user.
    pub user_id: String,
    /// Total accumulated score.
    pub score: i64,
    /// Last time the score changed, seconds since the Unix epoch.
    pub last_updated: i64,
}

/// One additive contribution to a user's score.
#[derive(Debug, Clone)]
pub struct ScoreDelta {
    /// Identity of the scored user.
    pub user_id: String,
    /// Points to add to the accumulated score.
    pub delta: i64,
    /// Settlement time, seconds since the Unix epoch.
    pub timestamp: i64,
}

/// Online/offline state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    /// A connection or recent request was observed.
    Online,
    /// Cleanly closed, swept as stale, or reset at startup.
    Offline,
}

impl DeviceStatus {
    /// Storage representation of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceStatus::Online => "online",
            DeviceStatus::Offline => "offline",
        }
    }
}

/// Presence row tracked per device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntity {
    /// Device identifier supplied by the client.
    pub id: String,
    /// Identity of the owning user.
    pub user_id: String,
    /// Last time the device was observed, seconds since the Unix epoch.
    pub last_seen: i64,
    /// Current presence status.
    pub status: DeviceStatus,
    /// Client descriptor reported on connection, if any.
    pub user_agent: Option<String>,
}
