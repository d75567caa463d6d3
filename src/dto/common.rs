use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{
    session::{LiveSession, Participant, QuestionSnapshot},
    state_machine::SessionPhase,
};

/// Coarse lifecycle status exposed to clients, collapsing the per-question
/// sub-phases the way the join protocol expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Lobby open, participants may join.
    Waiting,
    /// Quiz in progress; joins are rejected.
    Active,
    /// Terminal; final ranking published.
    Finished,
}

impl From<SessionPhase> for SessionStatus {
    fn from(phase: SessionPhase) -> Self {
        match phase {
            SessionPhase::Lobby => SessionStatus::Waiting,
            SessionPhase::Active(_) => SessionStatus::Active,
            SessionPhase::Finished => SessionStatus::Finished,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Public projection of a participant exposed to REST/SSE/WebSocket clients.
pub struct ParticipantSummary {
    pub id: Uuid,
    pub name: String,
    pub score: u32,
    pub answered: bool,
}

impl From<&Participant> for ParticipantSummary {
    fn from(participant: &Participant) -> Self {
        Self {
            id: participant.id,
            name: participant.name.clone(),
            score: participant.score,
            answered: participant.answered,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// A question as shown to players: no correct-option index until the reveal.
pub struct PublicQuestion {
    pub text: String,
    pub options: Vec<String>,
}

impl From<&QuestionSnapshot> for PublicQuestion {
    fn from(question: &QuestionSnapshot) -> Self {
        Self {
            text: question.text.clone(),
            options: question.options.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Summary of a live session returned by lookups and the admin listing.
pub struct SessionSummary {
    pub id: String,
    pub code: String,
    pub status: SessionStatus,
    pub quiz_title: String,
    pub question_count: usize,
    pub participant_count: usize,
    /// Index of the question currently or last shown, if the quiz started.
    pub current_question: Option<usize>,
    pub created_at: String,
}

impl SessionSummary {
    /// Project session data plus its lifecycle status into a summary.
    pub fn new(session: &LiveSession, status: SessionStatus) -> Self {
        Self {
            id: session.id.clone(),
            code: session.code.clone(),
            status,
            quiz_title: session.quiz.title.clone(),
            question_count: session.quiz.question_count(),
            participant_count: session.participants.len(),
            current_question: session.current_question,
            created_at: super::format_system_time(session.created_at),
        }
    }
}
