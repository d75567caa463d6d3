use std::{
    collections::HashMap,
    time::{Instant, SystemTime},
};

use indexmap::IndexMap;
use uuid::Uuid;

/// Read-only snapshot of a quiz taken at session creation.
///
/// The snapshot decouples the live flow from the quiz store: edits to the
/// stored quiz after the session was created do not affect a running game.
#[derive(Debug, Clone)]
pub struct QuizSnapshot {
    /// Identifier of the quiz in the catalogue.
    pub quiz_id: String,
    /// Display title shown in lobbies and summaries.
    pub title: String,
    /// Ordered questions played front to back.
    pub questions: Vec<QuestionSnapshot>,
    /// Seconds participants get to answer each question.
    pub time_limit_secs: u64,
}

impl QuizSnapshot {
    /// Number of questions in the quiz.
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Answer window in milliseconds, the unit the scoring engine works in.
    pub fn time_limit_ms(&self) -> u64 {
        self.time_limit_secs * 1_000
    }
}

/// A single question within a [`QuizSnapshot`]. Immutable for the session's lifetime.
#[derive(Debug, Clone)]
pub struct QuestionSnapshot {
    /// Question text.
    pub text: String,
    /// Ordered option texts participants pick from.
    pub options: Vec<String>,
    /// Zero-based index of the correct option.
    pub correct_option: usize,
}

/// Player info tracked during a live session.
///
/// The transport connection is deliberately not part of this struct: it lives
/// in the per-session connection registry keyed by participant id, so a
/// reconnect re-binds a fresh connection to the same logical participant.
#[derive(Debug, Clone)]
pub struct Participant {
    /// Stable identifier, unique within the session.
    pub id: Uuid,
    /// Display name chosen by the participant; not globally unique.
    pub name: String,
    /// Cumulative score across all answered questions.
    pub score: u32,
    /// Whether the participant already answered the current question.
    pub answered: bool,
    /// Latency of the answer to the current question, if any.
    pub last_latency_ms: Option<u64>,
    /// Sum of answer latencies across the session; ranking tie-break.
    pub total_latency_ms: u64,
    /// When the participant joined, for the final ranking tie-break.
    pub joined_at: SystemTime,
}

impl Participant {
    /// Build a fresh participant with a zero score.
    pub fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            score: 0,
            answered: false,
            last_latency_ms: None,
            total_latency_ms: 0,
            joined_at: SystemTime::now(),
        }
    }
}

/// One accepted answer submission.
#[derive(Debug, Clone)]
pub struct AnswerRecord {
    /// Participant who submitted.
    pub participant_id: Uuid,
    /// Selected option index.
    pub option_index: usize,
    /// Milliseconds between question display and submission.
    pub latency_ms: u64,
    /// Wall-clock submission timestamp.
    pub submitted_at: SystemTime,
}

/// Aggregated state for one live quiz session.
#[derive(Debug, Clone)]
pub struct LiveSession {
    /// Opaque time-derived identifier, distinct from the join code.
    pub id: String,
    /// Short human-typeable join code, stored uppercase.
    pub code: String,
    /// Identifier of the admin who created (and owns) the session.
    pub admin_id: String,
    /// Quiz snapshot played in this session.
    pub quiz: QuizSnapshot,
    /// Roster in join order; key is the participant id.
    pub participants: IndexMap<Uuid, Participant>,
    /// Answer ledger keyed by (question index, participant id).
    pub answers: HashMap<(usize, Uuid), AnswerRecord>,
    /// Index of the question currently or last shown; `None` before start.
    pub current_question: Option<usize>,
    /// Instant the current question went live; drives server-side latency.
    pub question_shown_at: Option<Instant>,
    /// Creation timestamp for summaries and auditing.
    pub created_at: SystemTime,
}

impl LiveSession {
    /// Build a new in-memory session in the lobby, with no participants and
    /// no question shown yet.
    pub fn new(id: String, code: String, admin_id: String, quiz: QuizSnapshot) -> Self {
        Self {
            id,
            code,
            admin_id,
            quiz,
            participants: IndexMap::new(),
            answers: HashMap::new(),
            current_question: None,
            question_shown_at: None,
            created_at: SystemTime::now(),
        }
    }

    /// The question currently being played, if the session has started.
    pub fn current_question_snapshot(&self) -> Option<&QuestionSnapshot> {
        let index = self.current_question?;
        self.quiz.questions.get(index)
    }

    /// The next question index the flow controller may show. `0` before the
    /// first question, `last + 1` afterwards (which may be out of bounds).
    pub fn next_question_index(&self) -> usize {
        self.current_question.map_or(0, |index| index + 1)
    }

    /// Whether a question beyond the current one exists.
    pub fn has_more_questions(&self) -> bool {
        self.next_question_index() < self.quiz.question_count()
    }

    /// Reset every participant's per-question answer tracking and clear the
    /// ledger slots for `index`, preparing it to be shown.
    pub fn prepare_question(&mut self, index: usize) {
        for participant in self.participants.values_mut() {
            participant.answered = false;
            participant.last_latency_ms = None;
        }
        self.answers.retain(|(question, _), _| *question != index);
    }

    /// Count selected options for `index`, one slot per option of that question.
    pub fn option_counts(&self, index: usize) -> Vec<u64> {
        let option_count = self
            .quiz
            .questions
            .get(index)
            .map_or(0, |question| question.options.len());
        let mut counts = vec![0u64; option_count];

        for ((question, _), record) in &self.answers {
            if *question == index {
                if let Some(slot) = counts.get_mut(record.option_index) {
                    *slot += 1;
                }
            }
        }

        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(questions: usize) -> QuizSnapshot {
        QuizSnapshot {
            quiz_id: "quiz-1".into(),
            title: "Capitals".into(),
            questions: (0..questions)
                .map(|n| QuestionSnapshot {
                    text: format!("Question {n}"),
                    options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
                    correct_option: 0,
                })
                .collect(),
            time_limit_secs: 20,
        }
    }

    fn session() -> LiveSession {
        LiveSession::new("session-1".into(), "ABC123".into(), "admin-1".into(), snapshot(3))
    }

    #[test]
    fn next_index_starts_at_zero_and_follows_current() {
        let mut session = session();
        assert_eq!(session.next_question_index(), 0);
        assert!(session.has_more_questions());

        session.current_question = Some(2);
        assert_eq!(session.next_question_index(), 3);
        assert!(!session.has_more_questions());
    }

    #[test]
    fn prepare_question_clears_flags_and_ledger_slot() {
        let mut session = session();
        let participant = Participant::new("Ava".into());
        let id = participant.id;
        session.participants.insert(id, participant);

        session.participants[&id].answered = true;
        session.participants[&id].last_latency_ms = Some(1500);
        session.answers.insert(
            (1, id),
            AnswerRecord {
                participant_id: id,
                option_index: 2,
                latency_ms: 1500,
                submitted_at: SystemTime::now(),
            },
        );

        session.prepare_question(1);

        assert!(!session.participants[&id].answered);
        assert_eq!(session.participants[&id].last_latency_ms, None);
        assert!(session.answers.is_empty());
    }

    #[test]
    fn option_counts_only_reflect_the_requested_question() {
        let mut session = session();
        let ava = Participant::new("Ava".into());
        let ben = Participant::new("Ben".into());
        let (ava_id, ben_id) = (ava.id, ben.id);
        session.participants.insert(ava_id, ava);
        session.participants.insert(ben_id, ben);

        for (question, id, option) in [(0usize, ava_id, 0usize), (0, ben_id, 2), (1, ava_id, 3)] {
            session.answers.insert(
                (question, id),
                AnswerRecord {
                    participant_id: id,
                    option_index: option,
                    latency_ms: 1000,
                    submitted_at: SystemTime::now(),
                },
            );
        }

        assert_eq!(session.option_counts(0), vec![1, 0, 1, 0]);
        assert_eq!(session.option_counts(1), vec![0, 0, 0, 1]);
    }
}
