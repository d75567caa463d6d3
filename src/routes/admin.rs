use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::{
        admin::{
            ActionResponse, AdminActionRequest, CreateSessionRequest, CreateSessionResponse,
            QuizListEntry, ShowQuestionRequest, StartSessionRequest,
        },
        common::SessionSummary,
    },
    error::AppError,
    services::{flow_service, session_service},
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Admin-only endpoints for creating and driving live sessions.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/quizzes", get(list_quizzes))
        .route("/admin/sessions", get(list_sessions).post(create_session))
        .route(
            "/admin/sessions/{id}",
            get(get_session_admin).delete(delete_session),
        )
        .route("/admin/sessions/{id}/start", post(start_session))
        .route("/admin/sessions/{id}/question", post(show_question))
        .route("/admin/sessions/{id}/reveal", post(reveal_results))
        .route("/admin/sessions/{id}/advance", post(advance_session))
        .route("/admin/sessions/{id}/finish", post(finish_session))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// Retrieve the quiz catalogue for the session creation picker.
#[utoipa::path(
    get,
    path = "/admin/quizzes",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "List available quizzes", body = [QuizListEntry]))
)]
pub async fn list_quizzes(
    State(state): State<SharedState>,
) -> Result<Json<Vec<QuizListEntry>>, AppError> {
    Ok(Json(session_service::list_quizzes(&state).await?))
}

/// Create a live session for a stored quiz.
#[utoipa::path(
    post,
    path = "/admin/sessions",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = CreateSessionRequest,
    responses((status = 201, description = "Session created", body = CreateSessionResponse))
)]
pub async fn create_session(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateSessionRequest>>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), AppError> {
    let created = session_service::create_session(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// List every registered session for the admin overview.
#[utoipa::path(
    get,
    path = "/admin/sessions",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "List sessions", body = [SessionSummary]))
)]
pub async fn list_sessions(
    State(state): State<SharedState>,
) -> Result<Json<Vec<SessionSummary>>, AppError> {
    Ok(Json(session_service::list_sessions(&state).await))
}

/// Retrieve one session's summary.
#[utoipa::path(
    get,
    path = "/admin/sessions/{id}",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the session")),
    responses((status = 200, description = "Session summary", body = SessionSummary))
)]
pub async fn get_session_admin(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSummary>, AppError> {
    Ok(Json(session_service::get_session(&state, &id).await?))
}

/// Destroy a session, notifying connected clients first.
#[utoipa::path(
    delete,
    path = "/admin/sessions/{id}",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the session to destroy")),
    request_body = AdminActionRequest,
    responses((status = 204, description = "Session destroyed"))
)]
pub async fn delete_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<AdminActionRequest>>,
) -> Result<StatusCode, AppError> {
    session_service::destroy(&state, &id, &payload.admin_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Start a waiting session; question zero goes live immediately.
#[utoipa::path(
    post,
    path = "/admin/sessions/{id}/start",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the session to start")),
    request_body = StartSessionRequest,
    responses((status = 200, description = "Session started", body = ActionResponse))
)]
pub async fn start_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<StartSessionRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    session_service::start(&state, &id, payload).await?;
    Ok(Json(ActionResponse::new("started")))
}

/// Show a specific question; the index must be the next expected one.
#[utoipa::path(
    post,
    path = "/admin/sessions/{id}/question",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the session")),
    request_body = ShowQuestionRequest,
    responses((status = 200, description = "Question shown", body = ActionResponse))
)]
pub async fn show_question(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<ShowQuestionRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    let handle = owned_session(&state, &id, &payload.admin_id).await?;
    flow_service::show_question(&state, &handle, payload.index).await?;
    Ok(Json(ActionResponse::new("question-shown")))
}

/// Close the current question early and broadcast results.
#[utoipa::path(
    post,
    path = "/admin/sessions/{id}/reveal",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the session")),
    request_body = AdminActionRequest,
    responses((status = 200, description = "Results revealed", body = ActionResponse))
)]
pub async fn reveal_results(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<AdminActionRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    let handle = owned_session(&state, &id, &payload.admin_id).await?;
    flow_service::reveal_results(&handle, flow_service::RevealTrigger::Admin).await?;
    Ok(Json(ActionResponse::new("revealed")))
}

/// Advance to the next question, or finalize after the last one.
#[utoipa::path(
    post,
    path = "/admin/sessions/{id}/advance",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the session")),
    request_body = AdminActionRequest,
    responses((status = 200, description = "Advanced", body = ActionResponse))
)]
pub async fn advance_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<AdminActionRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    let handle = owned_session(&state, &id, &payload.admin_id).await?;
    flow_service::advance(&state, &handle).await?;
    Ok(Json(ActionResponse::new("advanced")))
}

/// Stop the session early and publish the final ranking.
#[utoipa::path(
    post,
    path = "/admin/sessions/{id}/finish",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the session")),
    request_body = AdminActionRequest,
    responses((status = 200, description = "Session finished", body = ActionResponse))
)]
pub async fn finish_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<AdminActionRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    let handle = owned_session(&state, &id, &payload.admin_id).await?;
    flow_service::finalize(
        &state,
        &handle,
        crate::state::state_machine::FinishReason::ManualStop,
    )
    .await?;
    Ok(Json(ActionResponse::new("finished")))
}

/// Resolve a session and verify the caller owns it.
async fn owned_session(
    state: &SharedState,
    session_id: &str,
    admin_id: &str,
) -> Result<std::sync::Arc<crate::state::SessionHandle>, AppError> {
    let Some(handle) = state.registry().get(session_id) else {
        return Err(AppError::NotFound(format!(
            "session `{session_id}` not found"
        )));
    };

    let owner = handle.read_data(|session| session.admin_id.clone()).await;
    if owner != admin_id {
        return Err(AppError::Unauthorized(
            "only the owning admin may control the session".into(),
        ));
    }

    Ok(handle)
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    let expected = {
        let guard = state.admin_token().lock().await;
        guard.clone()
    };

    match expected {
        Some(token) if token == provided => Ok(next.run(req).await),
        Some(_) => Err(AppError::Unauthorized("invalid admin token".into())),
        None => Err(AppError::Unauthorized(
            "admin SSE stream not initialised yet".into(),
        )),
    }
}
