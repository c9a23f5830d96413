use axum::{
    Router,
    extract::{Path, State, WebSocketUpgrade},
    response::Response,
    routing::get,
};

use crate::{auth::Identity, error::AppError, services::websocket_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/ws/{user_id}",
    tag = "ws",
    params(("user_id" = String, Path, description = "Identity the connection is opened for")),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 403, description = "Path identity does not match the token claim"),
    )
)]
/// Upgrade the HTTP connection into the caller's live event stream.
///
/// The path identity must match the authenticated claim; a client cannot open
/// a connection on someone else's behalf.
pub async fn ws_handler(
    State(state): State<SharedState>,
    identity: Identity,
    Path(user_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    if identity.user_id != user_id {
        return Err(AppError::Forbidden(
            "connection identity does not match token claim".into(),
        ));
    }

    Ok(ws.on_upgrade(move |socket| websocket_service::handle_socket(state, socket, identity)))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws/{user_id}", get(ws_handler))
}
