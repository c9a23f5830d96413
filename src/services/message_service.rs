use tracing::warn;

use crate::{
    dao::{models::NewMessage, store::Store},
    dto::{
        message::{MessageAccepted, MessageList, SendMessageRequest},
        ws::{MessageEventBody, ServerEvent},
    },
    error::ServiceError,
    services::{push_service, unix_now},
    state::SharedState,
};

/// Persist a message and attempt realtime delivery to the receiver.
///
/// The message is durably recorded as undelivered first; the push webhook and
/// the live delivery attempt are both best-effort. When the live write
/// succeeds, this message and any older undelivered backlog for the same
/// (sender, receiver) pair are reconciled to delivered, catching up messages
/// queued while the receiver was briefly offline.
pub async fn send_message(
    state: &SharedState,
    sender_id: &str,
    request: SendMessageRequest,
) -> Result<MessageAccepted, ServiceError> {
    let store = state.require_store().await?;

    let message = store
        .insert_message(NewMessage {
            sender: sender_id.to_owned(),
            receiver: request.receiver.clone(),
            content: request.content,
            created_at: unix_now(),
        })
        .await?;

    push_service::notify(state, &message.receiver, sender_id, &message.content);

    let event = ServerEvent::Message {
        data: MessageEventBody {
            id: message.id,
            sender: message.sender.clone(),
            content: message.content.clone(),
            created_at: message.created_at,
        },
    };
    let delivered = state.hub().notify(&message.receiver, &event).await;

    if delivered {
        // Reconciliation is a side channel: its failure leaves rows
        // undelivered, to be caught up by the next successful send.
        if let Err(err) = store
            .mark_delivered_through(
                message.sender.clone(),
                message.receiver.clone(),
                message.created_at,
            )
            .await
        {
            warn!(
                receiver = %message.receiver,
                error = %err,
                "failed to reconcile delivered flags"
            );
        }
    }

    Ok(MessageAccepted {
        id: message.id,
        created_at: message.created_at,
        delivered,
    })
}

/// Messages addressed to `user_id` created strictly after `since`, newest first.
pub async fn fetch_messages(
    state: &SharedState,
    user_id: &str,
    since: Option<i64>,
) -> Result<MessageList, ServiceError> {
    let store = state.require_store().await?;
    let messages = store
        .messages_for(user_id.to_owned(), since.unwrap_or(0))
        .await?;
    Ok(MessageList {
        messages: messages.into_iter().map(Into::into).collect(),
    })
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
        dao::memory::MemoryStore,
        state::{AppState, ClientConnection, OUTBOUND_BUFFER, SharedState},
    };

    const ALICE: &str = "0191b1a0-0000-7000-8000-000000000001";
    const BOB: &str = "0191b1a0-0000-7000-8000-000000000002";

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

    fn request(receiver: &str, content: &str) -> SendMessageRequest {
        SendMessageRequest {
            receiver: receiver.into(),
            content: content.into(),
        }
    }

    #[tokio::test]
    async fn offline_receiver_leaves_message_undelivered() {
        let state = state_with_memory_store().await;

        let accepted = send_message(&state, ALICE, request(BOB, "hello"))
            .await
            .unwrap();
        assert!(!accepted.delivered);

        let inbox = fetch_messages(&state, BOB, None).await.unwrap();
        assert_eq!(inbox.messages.len(), 1);
        assert!(!inbox.messages[0].delivered);
    }

    #[tokio::test]
    async fn online_receiver_gets_the_event_and_backlog_is_reconciled() {
        let state = state_with_memory_store().await;

        // Backlog accumulated while Bob was offline.
        send_message(&state, ALICE, request(BOB, "first"))
            .await
            .unwrap();

        let mut bob_rx = connect(&state, BOB).await;
        let accepted = send_message(&state, ALICE, request(BOB, "second"))
            .await
            .unwrap();
        assert!(accepted.delivered);

        let frame = bob_rx.recv().await.expect("event pushed");
        let Message::Text(text) = frame else {
            panic!("expected text frame");
        };
        let event: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(event["type"], "message");
        assert_eq!(event["data"]["content"], "second");
        assert_eq!(event["data"]["sender"], ALICE);

        let inbox = fetch_messages(&state, BOB, None).await.unwrap();
        assert!(
            inbox.messages.iter().all(|m| m.delivered),
            "backlog reconciled alongside the delivered message"
        );
    }

    #[tokio::test]
    async fn degraded_state_rejects_sends_before_any_mutation() {
        let state = AppState::new(AppConfig::default());
        let result = send_message(&state, ALICE, request(BOB, "hello")).await;
        assert!(matches!(result, Err(ServiceError::Degraded)));
    }
}
