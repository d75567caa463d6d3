use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::common::ParticipantSummary;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from player WebSocket clients.
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PlayerInboundMessage {
    /// One-step join: resolves the code and binds this socket.
    Join { code: String, name: String },
    /// Re-bind this socket to an existing participant after a reconnect or
    /// an HTTP join.
    Rejoin {
        session_id: String,
        participant_id: Uuid,
    },
    /// Answer the current question.
    Answer {
        option_index: usize,
        /// Client-measured latency; the server clock is used when absent.
        #[serde(default)]
        latency_ms: Option<u64>,
    },
    /// Leave the session for good.
    Leave,
    #[serde(other)]
    Unknown,
}

impl PlayerInboundMessage {
    /// Parse and minimally validate an inbound JSON frame.
    pub fn from_json_str(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Direct notices sent to a single player socket, outside the broadcast
/// event catalogue.
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PlayerNotice {
    /// The socket is now bound to this participant.
    Joined {
        session_id: String,
        participant: ParticipantSummary,
    },
    /// A join or rejoin attempt failed.
    JoinError { message: String },
    /// An answer submission was rejected.
    AnswerRejected { message: String },
}
