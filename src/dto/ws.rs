use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::game::GameView;

/// Events pushed to connected clients through the hub.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A message addressed to this client arrived.
    Message {
        /// The delivered message.
        data: MessageEventBody,
    },
    /// Another user invited this client to a game.
    GameInvite {
        /// The freshly created game.
        game: GameView,
    },
    /// A game this client participates in settled through votes.
    GameResult {
        /// The closed game, both vote slots set.
        game: GameView,
    },
    /// A game this client participates in was settled by timeout.
    GameTimeout {
        /// The closed game, unset slots resolved to the fallback vote.
        game: GameView,
    },
}

/// Message body carried by a [`ServerEvent::Message`] push.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageEventBody {
    /// Surrogate key of the stored message.
    pub id: i64,
    /// Identity of the sending user.
    pub sender: String,
    /// Message body.
    pub content: String,
    /// Creation time, seconds since the Unix epoch.
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn events_are_tagged_with_their_wire_type() {
        let event = ServerEvent::Message {
            data: MessageEventBody {
                id: 9,
                sender: "a".into(),
                content: "hi".into(),
                created_at: 4,
            },
        };
        let value: Value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "message");
        assert_eq!(value["data"]["createdAt"], 4);

        let event = ServerEvent::GameTimeout {
            game: GameView {
                id: 1,
                sender: "a".into(),
                receiver: "b".into(),
                created: 0,
                svote: -1,
                rvote: -1,
                status: "closed".into(),
            },
        };
        let value: Value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "game_timeout");
        assert_eq!(value["game"]["status"], "closed");
    }
}
