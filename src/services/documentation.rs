use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Halves Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::message::send_message,
        crate::routes::message::get_messages,
        crate::routes::game::create_game,
        crate::routes::game::handle_vote,
        crate::routes::game::get_active_games,
        crate::routes::leaderboard::get_leaderboard,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::message::SendMessageRequest,
            crate::dto::message::MessageAccepted,
            crate::dto::message::MessageView,
            crate::dto::message::MessageList,
            crate::dto::game::CreateGameRequest,
            crate::dto::game::VoteRequest,
            crate::dto::game::GameView,
            crate::dto::leaderboard::LeaderboardEntry,
            crate::dto::ws::ServerEvent,
            crate::dto::ws::MessageEventBody,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "message", description = "Point-to-point messaging"),
        (name = "game", description = "Two-party voting games"),
        (name = "leaderboard", description = "Accumulated score rankings"),
        (name = "ws", description = "WebSocket presence connection"),
    )
)]
pub struct ApiDoc;
