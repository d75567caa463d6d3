use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Payload used to create a live session for a stored quiz.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateSessionRequest {
    /// Identifier of the quiz to snapshot and play.
    #[validate(length(min = 1))]
    pub quiz_id: String,
    /// Identifier of the admin who will own the session.
    #[validate(length(min = 1))]
    pub admin_id: String,
}

/// Response returned once a session exists in the registry.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateSessionResponse {
    /// Internal session identifier.
    pub session_id: String,
    /// Join code to put on the projector.
    pub code: String,
}

/// Body carried by admin control actions that need no extra data.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AdminActionRequest {
    /// Caller identity, checked against the session's owning admin.
    #[validate(length(min = 1))]
    pub admin_id: String,
}

/// Body of the start action.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct StartSessionRequest {
    /// Caller identity, checked against the session's owning admin.
    #[validate(length(min = 1))]
    pub admin_id: String,
    /// Start even with an empty roster. Only honored when the force-start
    /// policy is enabled.
    #[serde(default)]
    pub force: bool,
}

/// Body of the explicit show-question action.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ShowQuestionRequest {
    /// Caller identity, checked against the session's owning admin.
    #[validate(length(min = 1))]
    pub admin_id: String,
    /// Zero-based question index; must be the next expected index.
    pub index: usize,
}

/// Generic acknowledgement for admin control actions.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    /// Human-readable outcome, e.g. `started` or `revealed`.
    pub status: String,
}

impl ActionResponse {
    /// Build an acknowledgement with the given status word.
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }
}

/// Catalogue entry shown in the admin quiz picker.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuizListEntry {
    pub id: String,
    pub title: String,
    pub question_count: usize,
}

impl From<crate::dao::models::QuizListItem> for QuizListEntry {
    fn from(item: crate::dao::models::QuizListItem) -> Self {
        Self {
            id: item.id,
            title: item.title,
            question_count: item.question_count,
        }
    }
}
