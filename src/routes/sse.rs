use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    error::AppError,
    services::sse_service::{self, StreamKind},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/sessions/{id}",
    tag = "sse",
    params(("id" = String, Path, description = "Identifier of the session to watch")),
    responses((status = 200, description = "Per-session viewer SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream one session's realtime events to a board or controller view.
pub async fn session_stream(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let Some(handle) = state.registry().get(&id) else {
        return Err(AppError::NotFound(format!("session `{id}` not found")));
    };

    info!(session = %id, "new viewer SSE connection");
    let receiver = sse_service::subscribe_session(&handle).await;
    Ok(sse_service::to_sse_stream(receiver, StreamKind::Viewer))
}

#[utoipa::path(
    get,
    path = "/sse/admin",
    tag = "sse",
    responses((status = 200, description = "Admin SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream admin-only events, establishing or validating the admin token.
pub async fn admin_stream(
    State(state): State<SharedState>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let (receiver, token) = sse_service::subscribe_admin(&state).await?;
    info!("new admin SSE connection");
    sse_service::broadcast_admin_handshake(state.admin_sse(), &token);
    Ok(sse_service::to_sse_stream(
        receiver,
        StreamKind::Admin(state),
    ))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/admin", get(admin_stream))
        .route("/sse/sessions/{id}", get(session_stream))
}
