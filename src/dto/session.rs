use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::dto::{
    common::ParticipantSummary,
    validation::{validate_display_name, validate_join_code},
};

/// Payload a player submits to join a session by code.
#[derive(Debug, Deserialize, ToSchema)]
pub struct JoinRequest {
    /// Join code as shown on the host's screen; case-insensitive.
    pub code: String,
    /// Display name for the scoreboard.
    pub name: String,
}

impl Validate for JoinRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_join_code(&self.code) {
            errors.add("code", e);
        }
        if let Err(e) = validate_display_name(&self.name) {
            errors.add("name", e);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Response to a successful join.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinResponse {
    /// Identifier of the joined session, used for the WebSocket rebind.
    pub session_id: String,
    /// The freshly created participant.
    pub participant: ParticipantSummary,
}
