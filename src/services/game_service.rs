use std::time::Duration;

use tracing::{error, info, warn};

use crate::{
    dao::{
        models::{GameEntity, GameStatus, ScoreDelta, Vote, VoteSlot},
        store::Store,
    },
    dto::{
        game::{CreateGameRequest, GameView, VoteRequest},
        ws::ServerEvent,
    },
    error::ServiceError,
    services::{score_service, unix_now},
    state::SharedState,
};

/// Resolution applied to a vote slot still unset when a game times out.
///
/// An ignored invite reads as declining, so both-unvoted games settle as
/// (-1,-1) and a half-voted game still produces a meaningful payoff.
const TIMEOUT_FALLBACK_VOTE: Vote = Vote::Disagree;

/// Why a settlement happened, reflected in the event pushed to both parties.
#[derive(Debug, Clone, Copy)]
enum SettleCause {
    Votes,
    Timeout,
}

/// Create an open game, notify the invited party, and arm its timeout.
pub async fn create_game(
    state: &SharedState,
    sender_id: &str,
    request: CreateGameRequest,
) -> Result<GameView, ServiceError> {
    let store = state.require_store().await?;

    let game = store
        .insert_game(sender_id.to_owned(), request.receiver, unix_now())
        .await?;
    info!(game = game.id, sender = %game.sender, receiver = %game.receiver, "game created");

    let view = GameView::from(game.clone());
    state
        .hub()
        .notify(&game.receiver, &ServerEvent::GameInvite { game: view.clone() })
        .await;

    schedule_timeout(state, game.id, state.config().game_timeout());

    Ok(view)
}

/// Cast a vote, settling the game when the second slot fills.
///
/// The storage layer arbitrates every race here: the slot write succeeds for
/// at most one caller, and the open to closed transition commits at most once
/// whether it is driven by the second vote or by the timeout task.
pub async fn handle_vote(
    state: &SharedState,
    voter_id: &str,
    request: VoteRequest,
) -> Result<GameView, ServiceError> {
    let store = state.require_store().await?;
    let Some(vote) = Vote::from_code(request.vote) else {
        return Err(ServiceError::InvalidInput("vote must be 1 or -1".into()));
    };

    let game = store
        .find_game(request.game_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("game not found".into()))?;

    if game.status != GameStatus::Open {
        return Err(ServiceError::Conflict("game already closed".into()));
    }

    let slot = if voter_id == game.sender {
        VoteSlot::Sender
    } else if voter_id == game.receiver {
        VoteSlot::Receiver
    } else {
        return Err(ServiceError::Forbidden(
            "not a participant in this game".into(),
        ));
    };
    let already_voted = match slot {
        VoteSlot::Sender => game.svote.is_some(),
        VoteSlot::Receiver => game.rvote.is_some(),
    };
    if already_voted {
        return Err(ServiceError::Conflict("already voted".into()));
    }

    let Some(updated) = store.write_vote(game.id, slot, vote).await? else {
        // Lost a race between the pre-check and the conditional write; re-read
        // to report the precise reason.
        let closed = store
            .find_game(game.id)
            .await?
            .is_some_and(|g| g.status != GameStatus::Open);
        return Err(if closed {
            ServiceError::Conflict("game already closed".into())
        } else {
            ServiceError::Conflict("already voted".into())
        });
    };

    if updated.svote.is_some() && updated.rvote.is_some() {
        if let Some(settled) = store.close_game(updated.id, TIMEOUT_FALLBACK_VOTE).await? {
            state.timers().cancel(settled.id);
            info!(game = settled.id, "game settled by votes");
            settle(state, &settled, SettleCause::Votes).await?;
            return Ok(settled.into());
        }
    }

    Ok(updated.into())
}

/// Open games in which `user_id` participates.
pub async fn active_games(
    state: &SharedState,
    user_id: &str,
) -> Result<Vec<GameView>, ServiceError> {
    let store = state.require_store().await?;
    let games = store.open_games_for(user_id.to_owned()).await?;
    Ok(games.into_iter().map(Into::into).collect())
}

/// Arm (or re-arm) the deferred timeout settlement for a game.
pub fn schedule_timeout(state: &SharedState, game_id: i64, delay: Duration) {
    let task_state = state.clone();
    state.timers().schedule(game_id, delay, async move {
        settle_timeout(&task_state, game_id).await;
        task_state.timers().complete(game_id);
    });
}

/// Forcibly settle a game whose timeout horizon passed while it was open.
///
/// Failures are fatal only to this deferred task, never to the process.
pub async fn settle_timeout(state: &SharedState, game_id: i64) {
    if let Err(err) = try_settle_timeout(state, game_id).await {
        error!(game = game_id, error = %err, "timeout settlement failed");
    }
}

async fn try_settle_timeout(state: &SharedState, game_id: i64) -> Result<(), ServiceError> {
    let store = state.require_store().await?;

    let Some(game) = store.find_game(game_id).await? else {
        warn!(game = game_id, "timeout fired for unknown game");
        return Ok(());
    };
    if game.status != GameStatus::Open {
        // A vote completed concurrently and won the transition.
        return Ok(());
    }

    let Some(settled) = store.close_game(game_id, TIMEOUT_FALLBACK_VOTE).await? else {
        return Ok(());
    };
    info!(game = game_id, "game settled by timeout");
    settle(state, &settled, SettleCause::Timeout).await
}

/// Re-arm timeout settlement for every open game after a restart.
///
/// Games already past their horizon fire immediately.
pub async fn reschedule_open_games(state: &SharedState) {
    let Ok(store) = state.require_store().await else {
        return;
    };
    match store.list_open_games().await {
        Ok(games) => {
            let horizon = state.config().game_timeout().as_secs() as i64;
            let now = unix_now();
            let count = games.len();
            for game in games {
                let remaining = (game.created_at + horizon - now).max(0) as u64;
                schedule_timeout(state, game.id, Duration::from_secs(remaining));
            }
            if count > 0 {
                info!(count, "rescheduled timeout settlement for open games");
            }
        }
        Err(err) => warn!(error = %err, "failed to list open games for rescheduling"),
    }
}

/// Commit score deltas for a closed game and notify both parties.
async fn settle(
    state: &SharedState,
    game: &GameEntity,
    cause: SettleCause,
) -> Result<(), ServiceError> {
    let (svote, rvote) = match (game.svote, game.rvote) {
        (Some(svote), Some(rvote)) => (svote, rvote),
        _ => {
            // close_game resolves both slots; an unset one here is a bug.
            error!(game = game.id, "settled game has an unset vote slot");
            return Ok(());
        }
    };

    let (sender_points, receiver_points) = score_pair(svote, rvote);
    let now = unix_now();
    score_service::add_scores(
        state,
        vec![
            ScoreDelta {
                user_id: game.sender.clone(),
                delta: sender_points,
                timestamp: now,
            },
            ScoreDelta {
                user_id: game.receiver.clone(),
                delta: receiver_points,
                timestamp: now,
            },
        ],
    )
    .await?;

    let view = GameView::from(game.clone());
    let event = match cause {
        SettleCause::Votes => ServerEvent::GameResult { game: view },
        SettleCause::Timeout => ServerEvent::GameTimeout { game: view },
    };
    state.hub().notify(&game.sender, &event).await;
    state.hub().notify(&game.receiver, &event).await;

    Ok(())
}

/// Symmetric payoff table over the pair of cast votes.
fn score_pair(sender: Vote, receiver: Vote) -> (i64, i64) {
    match (sender, receiver) {
        (Vote::Agree, Vote::Disagree) => (0, 5),
        (Vote::Disagree, Vote::Agree) => (5, 0),
        (Vote::Agree, Vote::Agree) => (3, 3),
        (Vote::Disagree, Vote::Disagree) => (1, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::extract::ws::Message;
    use serde_json::Value;
    use tokio::sync::mpsc;

    use crate::{
        config::AppConfig,
        dao::{memory::MemoryStore, store::Store},
        state::{AppState, ClientConnection, OUTBOUND_BUFFER},
    };

    const ALICE: &str = "0191b1a0-0000-7000-8000-00000000000a";
    const BOB: &str = "0191b1a0-0000-7000-8000-00000000000b";
    const MALLORY: &str = "0191b1a0-0000-7000-8000-00000000000c";

    async fn state_with_memory_store() -> SharedState {
        let state = AppState::new(AppConfig::default());
        state.set_store(Arc::new(MemoryStore::new())).await;
        state
    }

    async fn connect(state: &SharedState, user: &str) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        state
            .hub()
            .register(ClientConnection::new(user.into(), tx))
            .await;
        rx
    }

    fn event_from(frame: Message) -> Value {
        let Message::Text(text) = frame else {
            panic!("expected text frame");
        };
        serde_json::from_str(&text).unwrap()
    }

    async fn score_of(state: &SharedState, user: &str) -> Option<i64> {
        score_service::leaderboard(state)
            .await
            .unwrap()
            .into_iter()
            .find(|entry| entry.user_id == user)
            .map(|entry| entry.score)
    }

    #[test]
    fn scoring_table_matches_the_payoff_rules() {
        assert_eq!(score_pair(Vote::Agree, Vote::Disagree), (0, 5));
        assert_eq!(score_pair(Vote::Disagree, Vote::Agree), (5, 0));
        assert_eq!(score_pair(Vote::Agree, Vote::Agree), (3, 3));
        assert_eq!(score_pair(Vote::Disagree, Vote::Disagree), (1, 1));
    }

    #[test]
    fn scoring_totals_are_bounded_and_non_negative() {
        for sender in [Vote::Agree, Vote::Disagree] {
            for receiver in [Vote::Agree, Vote::Disagree] {
                let (s, r) = score_pair(sender, receiver);
                assert!(s >= 0 && r >= 0);
                assert!([2, 5, 6].contains(&(s + r)));
            }
        }
    }

    #[tokio::test]
    async fn create_game_notifies_the_receiver_and_arms_a_timer() {
        let state = state_with_memory_store().await;
        let mut bob_rx = connect(&state, BOB).await;

        let view = create_game(
            &state,
            ALICE,
            CreateGameRequest {
                receiver: BOB.into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(view.status, "open");

        let event = event_from(bob_rx.recv().await.expect("invite pushed"));
        assert_eq!(event["type"], "game_invite");
        assert_eq!(event["game"]["id"], view.id);
        assert!(bob_rx.try_recv().is_err(), "exactly one invite event");

        assert_eq!(state.timers().pending(), 1);
    }

    #[tokio::test]
    async fn double_vote_settles_scores_and_notifies_both_parties() {
        let state = state_with_memory_store().await;
        let mut alice_rx = connect(&state, ALICE).await;
        let mut bob_rx = connect(&state, BOB).await;

        let game = create_game(
            &state,
            ALICE,
            CreateGameRequest {
                receiver: BOB.into(),
            },
        )
        .await
        .unwrap();
        bob_rx.recv().await.expect("invite");

        let open = handle_vote(
            &state,
            ALICE,
            VoteRequest {
                game_id: game.id,
                vote: 1,
            },
        )
        .await
        .unwrap();
        assert_eq!(open.status, "open");
        assert_eq!(open.svote, 1);

        let settled = handle_vote(
            &state,
            BOB,
            VoteRequest {
                game_id: game.id,
                vote: -1,
            },
        )
        .await
        .unwrap();
        assert_eq!(settled.status, "closed");

        assert_eq!(score_of(&state, BOB).await, Some(5));
        assert_eq!(score_of(&state, ALICE).await, Some(0));

        for rx in [&mut alice_rx, &mut bob_rx] {
            let event = event_from(rx.recv().await.expect("result pushed"));
            assert_eq!(event["type"], "game_result");
            assert_eq!(event["game"]["status"], "closed");
        }
        assert_eq!(state.timers().pending(), 0, "settlement cancels the timer");
    }

    #[tokio::test]
    async fn votes_after_closure_are_rejected() {
        let state = state_with_memory_store().await;
        let game = create_game(
            &state,
            ALICE,
            CreateGameRequest {
                receiver: BOB.into(),
            },
        )
        .await
        .unwrap();

        for (voter, vote) in [(ALICE, 1), (BOB, -1)] {
            handle_vote(
                &state,
                voter,
                VoteRequest {
                    game_id: game.id,
                    vote,
                },
            )
            .await
            .unwrap();
        }

        let replay = handle_vote(
            &state,
            ALICE,
            VoteRequest {
                game_id: game.id,
                vote: 1,
            },
        )
        .await;
        assert!(matches!(replay, Err(ServiceError::Conflict(message)) if message.contains("closed")));
    }

    #[tokio::test]
    async fn non_participants_and_double_voters_are_rejected() {
        let state = state_with_memory_store().await;
        let game = create_game(
            &state,
            ALICE,
            CreateGameRequest {
                receiver: BOB.into(),
            },
        )
        .await
        .unwrap();

        let outsider = handle_vote(
            &state,
            MALLORY,
            VoteRequest {
                game_id: game.id,
                vote: 1,
            },
        )
        .await;
        assert!(matches!(outsider, Err(ServiceError::Forbidden(_))));

        handle_vote(
            &state,
            ALICE,
            VoteRequest {
                game_id: game.id,
                vote: 1,
            },
        )
        .await
        .unwrap();
        let repeat = handle_vote(
            &state,
            ALICE,
            VoteRequest {
                game_id: game.id,
                vote: -1,
            },
        )
        .await;
        assert!(matches!(repeat, Err(ServiceError::Conflict(message)) if message.contains("voted")));

        let missing = handle_vote(
            &state,
            ALICE,
            VoteRequest {
                game_id: 999,
                vote: 1,
            },
        )
        .await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn concurrent_votes_for_one_slot_have_exactly_one_winner() {
        let state = state_with_memory_store().await;
        let game = create_game(
            &state,
            ALICE,
            CreateGameRequest {
                receiver: BOB.into(),
            },
        )
        .await
        .unwrap();

        let (left, right) = tokio::join!(
            handle_vote(
                &state,
                BOB,
                VoteRequest {
                    game_id: game.id,
                    vote: 1,
                },
            ),
            handle_vote(
                &state,
                BOB,
                VoteRequest {
                    game_id: game.id,
                    vote: -1,
                },
            ),
        );

        let outcomes = [left, right];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            outcomes
                .iter()
                .any(|r| matches!(r, Err(ServiceError::Conflict(_)))),
            "the loser observes a conflict"
        );

        let store = state.require_store().await.unwrap();
        let reloaded = store.find_game(game.id).await.unwrap().unwrap();
        assert!(reloaded.rvote.is_some(), "exactly one write landed");
    }

    #[tokio::test]
    async fn timeout_settles_an_unvoted_game_exactly_once() {
        let state = state_with_memory_store().await;
        let mut alice_rx = connect(&state, ALICE).await;
        let mut bob_rx = connect(&state, BOB).await;

        let game = create_game(
            &state,
            ALICE,
            CreateGameRequest {
                receiver: BOB.into(),
            },
        )
        .await
        .unwrap();
        bob_rx.recv().await.expect("invite");

        settle_timeout(&state, game.id).await;

        let store = state.require_store().await.unwrap();
        let reloaded = store.find_game(game.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, GameStatus::Closed);
        assert_eq!(reloaded.svote, Some(Vote::Disagree));
        assert_eq!(reloaded.rvote, Some(Vote::Disagree));

        assert_eq!(score_of(&state, ALICE).await, Some(1));
        assert_eq!(score_of(&state, BOB).await, Some(1));

        for rx in [&mut alice_rx, &mut bob_rx] {
            let event = event_from(rx.recv().await.expect("timeout event pushed"));
            assert_eq!(event["type"], "game_timeout");
        }

        // A late-firing duplicate observes the closed status and does nothing.
        settle_timeout(&state, game.id).await;
        assert_eq!(score_of(&state, ALICE).await, Some(1));
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn timeout_after_voluntary_settlement_is_a_no_op() {
        let state = state_with_memory_store().await;
        let game = create_game(
            &state,
            ALICE,
            CreateGameRequest {
                receiver: BOB.into(),
            },
        )
        .await
        .unwrap();
        for (voter, vote) in [(ALICE, 1), (BOB, 1)] {
            handle_vote(
                &state,
                voter,
                VoteRequest {
                    game_id: game.id,
                    vote,
                },
            )
            .await
            .unwrap();
        }
        assert_eq!(score_of(&state, ALICE).await, Some(3));

        settle_timeout(&state, game.id).await;
        assert_eq!(score_of(&state, ALICE).await, Some(3), "no double settlement");
    }

    #[tokio::test]
    async fn active_games_lists_only_open_games_for_the_user() {
        let state = state_with_memory_store().await;
        let open = create_game(
            &state,
            ALICE,
            CreateGameRequest {
                receiver: BOB.into(),
            },
        )
        .await
        .unwrap();
        let settled = create_game(
            &state,
            BOB,
            CreateGameRequest {
                receiver: ALICE.into(),
            },
        )
        .await
        .unwrap();
        settle_timeout(&state, settled.id).await;

        let games = active_games(&state, ALICE).await.unwrap();
        assert_eq!(games.iter().map(|g| g.id).collect::<Vec<_>>(), [open.id]);
        assert!(active_games(&state, MALLORY).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduled_overdue_game_fires_immediately() {
        let state = state_with_memory_store().await;
        let store = state.require_store().await.unwrap();
        // A game created long before the horizon, as if left over from a
        // previous run.
        let game = store
            .insert_game(ALICE.into(), BOB.into(), 0)
            .await
            .unwrap();

        reschedule_open_games(&state).await;

        // Paused time auto-advances through the zero-delay sleep.
        tokio::time::sleep(Duration::from_secs(1)).await;

        let reloaded = store.find_game(game.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, GameStatus::Closed);
        assert_eq!(state.timers().pending(), 0);
    }
}
