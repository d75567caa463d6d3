use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::common::{ParticipantSummary, PublicQuestion};

/// Every event broadcast over a session's realtime channels.
///
/// The tagged representation lets clients match exhaustively on `type`
/// instead of sniffing object shapes. The serialized tag doubles as the SSE
/// event name on the viewer stream.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LiveEvent {
    /// A participant joined the lobby.
    ParticipantJoined {
        participant: ParticipantSummary,
    },
    /// Full roster resync, sent on subscribe and on reconnect.
    ParticipantList {
        participants: Vec<ParticipantSummary>,
    },
    /// A participant left (or was removed from) the session.
    ParticipantLeft {
        participant_id: Uuid,
    },
    /// The admin started the quiz; waiting screens flip to the game view.
    QuizStarted,
    /// A question went live and the countdown started.
    QuestionShown {
        index: usize,
        question: PublicQuestion,
        time_limit_secs: u64,
    },
    /// An answer was accepted; carries the submitter's running score.
    AnswerAck {
        participant_id: Uuid,
        running_score: u32,
    },
    /// The current question closed; per-option counts and the correct index.
    ResultsShown {
        index: usize,
        counts: Vec<u64>,
        correct_option: usize,
    },
    /// Terminal ranking, best first.
    FinalResults {
        ranking: Vec<RankedParticipant>,
    },
    /// The admin destroyed the session; clients should disconnect.
    SessionEnded,
}

impl LiveEvent {
    /// Stable wire name of the event, identical to the serde tag.
    pub fn name(&self) -> &'static str {
        match self {
            LiveEvent::ParticipantJoined { .. } => "participant-joined",
            LiveEvent::ParticipantList { .. } => "participant-list",
            LiveEvent::ParticipantLeft { .. } => "participant-left",
            LiveEvent::QuizStarted => "quiz-started",
            LiveEvent::QuestionShown { .. } => "question-shown",
            LiveEvent::AnswerAck { .. } => "answer-ack",
            LiveEvent::ResultsShown { .. } => "results-shown",
            LiveEvent::FinalResults { .. } => "final-results",
            LiveEvent::SessionEnded => "session-ended",
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// One row of the final ranking.
pub struct RankedParticipant {
    /// 1-based position in the ranking.
    pub rank: usize,
    pub id: Uuid,
    pub name: String,
    pub score: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_tag_matches_event_name() {
        let events = vec![
            LiveEvent::QuizStarted,
            LiveEvent::SessionEnded,
            LiveEvent::ParticipantLeft {
                participant_id: Uuid::new_v4(),
            },
            LiveEvent::AnswerAck {
                participant_id: Uuid::new_v4(),
                running_score: 1_500,
            },
        ];

        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], event.name());
        }
    }
}
