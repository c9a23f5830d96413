use serde::Serialize;
use tracing::warn;

use crate::state::SharedState;

#[derive(Debug, Serialize)]
struct PushPayload {
    receiver: String,
    sender: String,
    message: String,
}

/// Post a notification to the configured webhook, fire-and-forget.
///
/// The push provider is an external collaborator; delivery failures are logged
/// and never reach the caller. With no webhook configured this is a no-op.
pub fn notify(state: &SharedState, receiver: &str, sender: &str, text: &str) {
    let Some(url) = state.config().push_webhook().map(str::to_owned) else {
        return;
    };

    let client = state.http().clone();
    let payload = PushPayload {
        receiver: receiver.to_owned(),
        sender: sender.to_owned(),
        message: text.to_owned(),
    };

    tokio::spawn(async move {
        let result = client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .and_then(|response| response.error_for_status());
        if let Err(err) = result {
            warn!(receiver = %payload.receiver, error = %err, "push notification failed");
        }
    });
}
