use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the live quiz backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sessions::join_session,
        crate::routes::sessions::get_session,
        crate::routes::admin::create_session,
        crate::routes::admin::list_sessions,
        crate::routes::admin::get_session_admin,
        crate::routes::admin::delete_session,
        crate::routes::admin::start_session,
        crate::routes::admin::show_question,
        crate::routes::admin::reveal_results,
        crate::routes::admin::advance_session,
        crate::routes::admin::finish_session,
        crate::routes::admin::list_quizzes,
        crate::routes::sse::admin_stream,
        crate::routes::sse::session_stream,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::JoinRequest,
            crate::dto::session::JoinResponse,
            crate::dto::admin::CreateSessionRequest,
            crate::dto::admin::CreateSessionResponse,
            crate::dto::admin::AdminActionRequest,
            crate::dto::admin::StartSessionRequest,
            crate::dto::admin::ShowQuestionRequest,
            crate::dto::admin::ActionResponse,
            crate::dto::admin::QuizListEntry,
            crate::dto::common::SessionSummary,
            crate::dto::common::ParticipantSummary,
            crate::dto::common::PublicQuestion,
            crate::dto::events::LiveEvent,
            crate::dto::events::RankedParticipant,
            crate::dto::ws::PlayerInboundMessage,
            crate::dto::ws::PlayerNotice,
            crate::dto::sse::AdminHandshake,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "session", description = "Public join and lookup operations"),
        (name = "admin", description = "Admin-only session control"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "players", description = "WebSocket operations for player devices"),
    )
)]
pub struct ApiDoc;
