use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::post,
};
use validator::Validate;

use crate::{
    auth::Identity,
    dto::message::{MessageAccepted, MessageList, MessagesQuery, SendMessageRequest},
    error::AppError,
    services::message_service,
    state::SharedState,
};

/// Routes handling message send and fetch operations.
pub fn router() -> Router<SharedState> {
    Router::new().route("/messages", post(send_message).get(get_messages))
}

#[utoipa::path(
    post,
    path = "/messages",
    tag = "message",
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message stored", body = MessageAccepted),
        (status = 400, description = "Malformed receiver or content"),
    )
)]
/// Store a message and attempt realtime delivery to its receiver.
pub async fn send_message(
    State(state): State<SharedState>,
    identity: Identity,
    Json(payload): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageAccepted>), AppError> {
    payload.validate()?;
    let accepted = message_service::send_message(&state, &identity.user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(accepted)))
}

#[utoipa::path(
    get,
    path = "/messages",
    tag = "message",
    params(("from" = Option<i64>, Query, description = "Only messages created strictly after this Unix timestamp")),
    responses((status = 200, description = "Messages addressed to the caller", body = MessageList))
)]
/// Fetch messages addressed to the caller, newest first.
pub async fn get_messages(
    State(state): State<SharedState>,
    identity: Identity,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<MessageList>, AppError> {
    let list = message_service::fetch_messages(&state, &identity.user_id, query.from).await?;
    Ok(Json(list))
}
