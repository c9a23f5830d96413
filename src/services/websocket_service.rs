use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};

use crate::{
    auth::Identity,
    services::presence_service,
    state::{ClientConnection, OUTBOUND_BUFFER, SharedState},
};

/// Handle the full lifecycle for an individual client WebSocket connection.
///
/// The connection is registered in the hub under the authenticated identity,
/// replacing (and closing) any previous connection for the same user. The read
/// loop only watches for control frames and transport failure; clients receive
/// events, they do not speak a protocol upstream.
pub async fn handle_socket(state: SharedState, socket: WebSocket, identity: Identity) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(OUTBOUND_BUFFER);

    // Dedicated writer task keeps outbound events flowing even while we await
    // inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let user_id = identity.user_id.clone();
    let connection = ClientConnection::new(user_id.clone(), outbound_tx.clone());
    let conn_id = connection.conn_id();

    if let Some(previous) = state.hub().register(connection).await {
        // The replaced transport is orphaned by the registry; nudge it shut so
        // it does not linger until the client notices.
        previous.close();
        info!(user = %user_id, "replaced previous connection for user");
    }
    presence_service::connection_opened(&state, &identity).await;
    info!(user = %user_id, "client connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.try_send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.try_send(Message::Close(frame));
                break;
            }
            // Inbound data frames carry no protocol; drain and ignore them.
            Ok(_) => {}
            Err(err) => {
                warn!(user = %user_id, error = %err, "websocket error");
                break;
            }
        }
    }

    // A newer connection may already own the slot; unregister only our own.
    state.hub().unregister(&user_id, conn_id).await;
    presence_service::connection_closed(&state, &identity).await;
    info!(user = %user_id, "client disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::Sender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
