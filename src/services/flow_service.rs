use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        common::PublicQuestion,
        events::{LiveEvent, RankedParticipant},
    },
    error::ServiceError,
    services::{
        live_events::{self, Audience},
        scoring,
    },
    state::{
        QuestionTimer, SessionHandle, SharedState,
        state_machine::{ActivePhase, FinishReason, FlowEvent, SessionPhase},
    },
};

/// What caused a reveal: an explicit admin action or the countdown expiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealTrigger {
    /// Admin closed the question early.
    Admin,
    /// The countdown for this question index ran out.
    Countdown {
        /// Question index the countdown was armed for.
        index: usize,
    },
}

/// Result of an accepted answer submission.
#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    /// Submitting participant.
    pub participant_id: Uuid,
    /// Whether the selected option was correct.
    pub correct: bool,
    /// Points awarded for this answer.
    pub points: u32,
    /// Participant's score after this answer.
    pub running_score: u32,
}

/// Start the quiz: transition out of the lobby and put question zero on screen.
pub async fn start_quiz(
    state: &SharedState,
    handle: &Arc<SessionHandle>,
) -> Result<(), ServiceError> {
    activate_question(state, handle, 0, FlowEvent::StartQuiz).await
}

/// Show a specific question. The index must be the next expected one; the
/// question flow only ever moves forward.
pub async fn show_question(
    state: &SharedState,
    handle: &Arc<SessionHandle>,
    index: usize,
) -> Result<(), ServiceError> {
    activate_question(state, handle, index, FlowEvent::ShowQuestion).await
}

/// Accept one answer for the current question.
///
/// The session's data lock serializes concurrent submissions; the first one
/// for a (question, participant) pair wins and every later one is rejected
/// with [`ServiceError::AlreadyAnswered`].
pub async fn submit_answer(
    handle: &Arc<SessionHandle>,
    participant_id: Uuid,
    option_index: usize,
    latency_ms: Option<u64>,
) -> Result<AnswerOutcome, ServiceError> {
    if handle.phase().await != SessionPhase::Active(ActivePhase::Question) {
        return Err(ServiceError::InvalidState("no active question".into()));
    }

    let outcome = handle
        .with_data_mut(|session| {
            // `question_shown_at` is cleared under this same lock during a
            // reveal, so it is the authoritative accepting-answers marker.
            let shown_at = session
                .question_shown_at
                .ok_or_else(|| ServiceError::InvalidState("no active question".into()))?;
            let index = session
                .current_question
                .ok_or_else(|| ServiceError::InvalidState("no active question".into()))?;

            let question = session
                .quiz
                .questions
                .get(index)
                .ok_or_else(|| ServiceError::Internal("current question out of bounds".into()))?;

            if option_index >= question.options.len() {
                return Err(ServiceError::InvalidInput(format!(
                    "option index {option_index} out of range"
                )));
            }

            let correct = option_index == question.correct_option;
            let time_limit_ms = session.quiz.time_limit_ms();

            let participant = session
                .participants
                .get(&participant_id)
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("participant `{participant_id}` not found"))
                })?;
            if participant.answered || session.answers.contains_key(&(index, participant_id)) {
                return Err(ServiceError::AlreadyAnswered);
            }

            // Client-measured latency excludes network transit; fall back to
            // the server clock when the client did not report one.
            let observed_ms = shown_at.elapsed().as_millis() as u64;
            let latency = latency_ms.unwrap_or(observed_ms);

            let points = scoring::score(correct, latency, time_limit_ms);

            let participant = session
                .participants
                .get_mut(&participant_id)
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("participant `{participant_id}` not found"))
                })?;
            participant.answered = true;
            participant.last_latency_ms = Some(latency);
            participant.total_latency_ms += latency;
            participant.score += points;
            let running_score = participant.score;

            session.answers.insert(
                (index, participant_id),
                crate::state::session::AnswerRecord {
                    participant_id,
                    option_index,
                    latency_ms: latency,
                    submitted_at: std::time::SystemTime::now(),
                },
            );

            Ok(AnswerOutcome {
                participant_id,
                correct,
                points,
                running_score,
            })
        })
        .await?;

    handle.touch().await;

    let ack = LiveEvent::AnswerAck {
        participant_id: outcome.participant_id,
        running_score: outcome.running_score,
    };
    live_events::publish(handle, Audience::Viewers, &ack);
    live_events::send_to_player(handle, outcome.participant_id, &ack);

    Ok(outcome)
}

/// Close the current question and broadcast per-option results.
///
/// The countdown task calls this with its question index; if the session has
/// already moved on (early reveal, finalize) the stale expiry is a no-op.
pub async fn reveal_results(
    handle: &Arc<SessionHandle>,
    trigger: RevealTrigger,
) -> Result<(), ServiceError> {
    if let RevealTrigger::Countdown { index } = trigger {
        let still_current = handle
            .read_data(|session| session.current_question == Some(index))
            .await;
        if !still_current || handle.phase().await != SessionPhase::Active(ActivePhase::Question) {
            debug!(index, "stale countdown expiry ignored");
            return Ok(());
        }
    }

    // An admin reveal races the countdown; cancelling inside the transition
    // would let the timer task abort itself mid-reveal, so disarm first.
    match trigger {
        RevealTrigger::Admin => handle.cancel_timer().await,
        RevealTrigger::Countdown { .. } => handle.disarm_timer().await,
    }

    let (results, _phase) = handle
        .run_transition(FlowEvent::Reveal, || async {
            handle
                .with_data_mut(|session| {
                    let index = session.current_question.ok_or_else(|| {
                        ServiceError::InvalidState("no active question".into())
                    })?;
                    let correct_option = session
                        .quiz
                        .questions
                        .get(index)
                        .map(|question| question.correct_option)
                        .ok_or_else(|| {
                            ServiceError::Internal("current question out of bounds".into())
                        })?;

                    session.question_shown_at = None;

                    Ok(LiveEvent::ResultsShown {
                        index,
                        counts: session.option_counts(index),
                        correct_option,
                    })
                })
                .await
        })
        .await?;

    live_events::publish(handle, Audience::Everyone, &results);
    Ok(())
}

/// Move on after a reveal: show the next question, or finalize when the quiz
/// is exhausted.
pub async fn advance(state: &SharedState, handle: &Arc<SessionHandle>) -> Result<(), ServiceError> {
    let (has_more, next_index) = handle
        .read_data(|session| (session.has_more_questions(), session.next_question_index()))
        .await;

    if has_more {
        show_question(state, handle, next_index).await
    } else {
        finalize(state, handle, FinishReason::QuizCompleted).await
    }
}

/// Terminate the session: publish the final ranking and free the join code.
pub async fn finalize(
    state: &SharedState,
    handle: &Arc<SessionHandle>,
    reason: FinishReason,
) -> Result<(), ServiceError> {
    handle.cancel_timer().await;

    let (event, _phase) = handle
        .run_transition(FlowEvent::Finish(reason), || async {
            handle
                .with_data_mut(|session| {
                    session.question_shown_at = None;

                    let mut standings: Vec<_> =
                        session.participants.values().cloned().collect();
                    scoring::rank(&mut standings);

                    let ranking = standings
                        .into_iter()
                        .enumerate()
                        .map(|(position, participant)| RankedParticipant {
                            rank: position + 1,
                            id: participant.id,
                            name: participant.name,
                            score: participant.score,
                        })
                        .collect();

                    Ok(LiveEvent::FinalResults { ranking })
                })
                .await
        })
        .await?;

    let (session_id, code) = handle
        .read_data(|session| (session.id.clone(), session.code.clone()))
        .await;
    // Codes are unique among non-finished sessions only.
    state.registry().release_code(&code);

    info!(session = %session_id, ?reason, "session finished");
    live_events::publish(handle, Audience::Everyone, &event);
    Ok(())
}

/// Validate the index, run the show transition, arm the countdown, broadcast.
async fn activate_question(
    state: &SharedState,
    handle: &Arc<SessionHandle>,
    index: usize,
    event: FlowEvent,
) -> Result<(), ServiceError> {
    let ((shown, time_limit_secs, session_id), _phase) = handle
        .run_transition(event, || async {
            handle
                .with_data_mut(|session| {
                    let expected = session.next_question_index();
                    if index != expected {
                        return Err(ServiceError::InvalidState(format!(
                            "expected question {expected}, got {index}"
                        )));
                    }

                    let question = session.quiz.questions.get(index).ok_or_else(|| {
                        ServiceError::InvalidState(format!("quiz has no question {index}"))
                    })?;
                    let public: PublicQuestion = question.into();

                    session.prepare_question(index);
                    session.current_question = Some(index);
                    session.question_shown_at = Some(std::time::Instant::now());

                    Ok((
                        LiveEvent::QuestionShown {
                            index,
                            question: public,
                            time_limit_secs: session.quiz.time_limit_secs,
                        },
                        session.quiz.time_limit_secs,
                        session.id.clone(),
                    ))
                })
                .await
        })
        .await?;

    arm_countdown(state, handle, &session_id, index, time_limit_secs).await;

    if matches!(event, FlowEvent::StartQuiz) {
        live_events::publish(handle, Audience::Everyone, &LiveEvent::QuizStarted);
    }
    live_events::publish(handle, Audience::Everyone, &shown);
    Ok(())
}

/// Arm the auto-reveal countdown for `index`.
///
/// The task re-resolves the session through the registry so a destroyed
/// session simply drops the expiry.
async fn arm_countdown(
    state: &SharedState,
    handle: &Arc<SessionHandle>,
    session_id: &str,
    index: usize,
    time_limit_secs: u64,
) {
    let task_state = state.clone();
    let task_session_id = session_id.to_owned();

    let task = tokio::spawn(async move {
        sleep(Duration::from_secs(time_limit_secs)).await;

        let Some(handle) = task_state.registry().get(&task_session_id) else {
            return;
        };
        if let Err(err) = reveal_results(&handle, RevealTrigger::Countdown { index }).await {
            warn!(session = %task_session_id, index, error = %err, "countdown reveal failed");
        }
    });

    handle.arm_timer(QuestionTimer::new(index, task)).await;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{QuestionRecord, QuizRecord},
            quiz_store::memory::MemoryQuizStore,
        },
        dto::admin::{CreateSessionRequest, StartSessionRequest},
        services::session_service,
        state::AppState,
    };

    fn quiz_record(questions: usize, time_limit_secs: u64) -> QuizRecord {
        QuizRecord {
            id: "quiz-1".into(),
            title: "Capitals".into(),
            questions: (0..questions)
                .map(|n| QuestionRecord {
                    text: format!("Question {n}"),
                    options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
                    correct_option: 1,
                })
                .collect(),
            time_limit_secs: Some(time_limit_secs),
        }
    }

    /// Create a started two-player session over a quiz with the given shape.
    async fn running_session(
        questions: usize,
        time_limit_secs: u64,
    ) -> (SharedState, Arc<SessionHandle>, Uuid, Uuid) {
        let state = AppState::new(AppConfig::default());
        let store = MemoryQuizStore::new();
        store.insert(quiz_record(questions, time_limit_secs)).await;
        state.set_quiz_store(Arc::new(store)).await;

        let created = session_service::create_session(
            &state,
            CreateSessionRequest {
                quiz_id: "quiz-1".into(),
                admin_id: "admin-1".into(),
            },
        )
        .await
        .unwrap();

        let (handle, _, ava) = session_service::join(&state, &created.code, "Ava")
            .await
            .unwrap();
        let (_, _, ben) = session_service::join(&state, &created.code, "Ben")
            .await
            .unwrap();

        session_service::start(
            &state,
            &created.session_id,
            StartSessionRequest {
                admin_id: "admin-1".into(),
                force: false,
            },
        )
        .await
        .unwrap();

        (state, handle, ava.id, ben.id)
    }

    #[tokio::test]
    async fn three_question_scenario_ranks_ava_over_ben() {
        let (state, handle, ava, ben) = running_session(3, 20).await;

        assert_eq!(
            handle.phase().await,
            SessionPhase::Active(ActivePhase::Question)
        );

        // Question 0: Ava answers correctly at 2s, Ben picks a wrong option.
        let ava_outcome = submit_answer(&handle, ava, 1, Some(2_000)).await.unwrap();
        assert!(ava_outcome.correct);
        assert!(ava_outcome.points > 0);

        let ben_outcome = submit_answer(&handle, ben, 3, Some(2_500)).await.unwrap();
        assert!(!ben_outcome.correct);
        assert_eq!(ben_outcome.points, 0);
        assert_eq!(ben_outcome.running_score, 0);

        reveal_results(&handle, RevealTrigger::Admin).await.unwrap();
        let counts = handle.read_data(|session| session.option_counts(0)).await;
        assert_eq!(counts, vec![0, 1, 0, 1]);

        // Two more question cycles without answers.
        advance(&state, &handle).await.unwrap();
        reveal_results(&handle, RevealTrigger::Admin).await.unwrap();
        advance(&state, &handle).await.unwrap();
        reveal_results(&handle, RevealTrigger::Admin).await.unwrap();

        advance(&state, &handle).await.unwrap();
        assert_eq!(handle.phase().await, SessionPhase::Finished);

        let standings = handle
            .read_data(|session| {
                let mut participants: Vec<_> = session.participants.values().cloned().collect();
                scoring::rank(&mut participants);
                participants
            })
            .await;
        assert_eq!(standings[0].id, ava);
        assert_eq!(standings[1].id, ben);
        assert!(standings[0].score > 0);
        assert_eq!(standings[1].score, 0);

        // The join code is freed once the session is terminal.
        let code = handle.read_data(|session| session.code.clone()).await;
        assert!(state.registry().get_by_code(&code).is_none());
    }

    #[tokio::test]
    async fn duplicate_submission_is_rejected_and_not_scored() {
        let (_state, handle, ava, _ben) = running_session(1, 20).await;

        let first = submit_answer(&handle, ava, 1, Some(1_000)).await.unwrap();
        let err = submit_answer(&handle, ava, 1, Some(500)).await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyAnswered));

        let score = handle
            .read_data(|session| session.participants[&ava].score)
            .await;
        assert_eq!(score, first.running_score);

        let records = handle.read_data(|session| session.answers.len()).await;
        assert_eq!(records, 1);
    }

    #[tokio::test]
    async fn racing_submissions_accept_exactly_one() {
        let (_state, handle, ava, _ben) = running_session(1, 20).await;

        let (left, right) = tokio::join!(
            submit_answer(&handle, ava, 1, Some(900)),
            submit_answer(&handle, ava, 2, Some(901)),
        );

        let accepted = [&left, &right].iter().filter(|r| r.is_ok()).count();
        assert_eq!(accepted, 1);
        assert!(
            matches!(left, Err(ServiceError::AlreadyAnswered))
                || matches!(right, Err(ServiceError::AlreadyAnswered))
        );
    }

    #[tokio::test]
    async fn submissions_outside_a_live_question_are_rejected() {
        let (_state, handle, ava, _ben) = running_session(1, 20).await;

        reveal_results(&handle, RevealTrigger::Admin).await.unwrap();
        let err = submit_answer(&handle, ava, 1, Some(100)).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn out_of_range_option_is_rejected() {
        let (_state, handle, ava, _ben) = running_session(1, 20).await;

        let err = submit_answer(&handle, ava, 9, Some(100)).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn unknown_participant_cannot_answer() {
        let (_state, handle, _ava, _ben) = running_session(1, 20).await;

        let err = submit_answer(&handle, Uuid::new_v4(), 1, Some(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn question_index_only_moves_forward() {
        let (state, handle, _ava, _ben) = running_session(3, 20).await;

        reveal_results(&handle, RevealTrigger::Admin).await.unwrap();

        // Replaying question 0 violates monotonic advance.
        let err = show_question(&state, &handle, 0).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        // Skipping ahead is equally invalid.
        let err = show_question(&state, &handle, 2).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        show_question(&state, &handle, 1).await.unwrap();
        assert_eq!(
            handle.read_data(|session| session.current_question).await,
            Some(1)
        );
    }

    #[tokio::test]
    async fn countdown_expiry_reveals_results_without_admin_action() {
        let (_state, handle, _ava, _ben) = running_session(1, 1).await;

        tokio::time::sleep(Duration::from_millis(1_400)).await;

        assert_eq!(
            handle.phase().await,
            SessionPhase::Active(ActivePhase::Results)
        );
    }

    #[tokio::test]
    async fn early_reveal_cancels_the_countdown() {
        let (_state, handle, _ava, _ben) = running_session(1, 1).await;

        reveal_results(&handle, RevealTrigger::Admin).await.unwrap();
        let version_after_reveal = handle.snapshot().await.version;

        // Were the countdown still alive it would fire within this window;
        // the phase and version must not move again.
        tokio::time::sleep(Duration::from_millis(1_400)).await;

        assert_eq!(
            handle.phase().await,
            SessionPhase::Active(ActivePhase::Results)
        );
        assert_eq!(handle.snapshot().await.version, version_after_reveal);
    }

    #[tokio::test]
    async fn stale_countdown_expiry_is_a_no_op() {
        let (state, handle, _ava, _ben) = running_session(2, 20).await;

        reveal_results(&handle, RevealTrigger::Admin).await.unwrap();
        advance(&state, &handle).await.unwrap();

        // A leftover expiry for question 0 must not touch question 1.
        reveal_results(&handle, RevealTrigger::Countdown { index: 0 })
            .await
            .unwrap();
        assert_eq!(
            handle.phase().await,
            SessionPhase::Active(ActivePhase::Question)
        );
        assert_eq!(
            handle.read_data(|session| session.current_question).await,
            Some(1)
        );
    }

    #[tokio::test]
    async fn manual_stop_finalizes_early() {
        let (state, handle, ava, _ben) = running_session(3, 20).await;

        submit_answer(&handle, ava, 1, Some(1_000)).await.unwrap();
        finalize(&state, &handle, FinishReason::ManualStop)
            .await
            .unwrap();

        assert_eq!(handle.phase().await, SessionPhase::Finished);
        let err = show_question(&state, &handle, 1).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }
}
