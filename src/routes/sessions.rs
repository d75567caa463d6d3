use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::{
        common::SessionSummary,
        session::{JoinRequest, JoinResponse},
    },
    error::AppError,
    services::session_service,
    state::SharedState,
};

/// Public session routes: joining by code and summary lookup.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions/join", post(join_session))
        .route("/sessions/{id}", get(get_session))
}

/// Join a waiting session using its join code.
#[utoipa::path(
    post,
    path = "/sessions/join",
    tag = "session",
    request_body = JoinRequest,
    responses(
        (status = 200, description = "Joined", body = JoinResponse),
        (status = 404, description = "No session with this code"),
        (status = 409, description = "Session already started or finished")
    )
)]
pub async fn join_session(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<JoinRequest>>,
) -> Result<Json<JoinResponse>, AppError> {
    let (_handle, session_id, participant) =
        session_service::join(&state, &payload.code, &payload.name).await?;
    Ok(Json(JoinResponse {
        session_id,
        participant,
    }))
}

/// Look up a session summary by its identifier.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    tag = "session",
    params(("id" = String, Path, description = "Identifier of the session")),
    responses(
        (status = 200, description = "Session summary", body = SessionSummary),
        (status = 404, description = "Session not found")
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSummary>, AppError> {
    Ok(Json(session_service::get_session(&state, &id).await?))
}
