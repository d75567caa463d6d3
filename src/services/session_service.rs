use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::models::QuizRecord,
    dto::{
        admin::{CreateSessionRequest, CreateSessionResponse, QuizListEntry, StartSessionRequest},
        common::{ParticipantSummary, SessionSummary},
        events::LiveEvent,
        sse::SessionCreatedEvent,
        validation::validate_display_name,
    },
    error::ServiceError,
    services::{
        flow_service,
        live_events::{self, Audience},
    },
    state::{SessionHandle, SharedState, session::{Participant, QuizSnapshot}, state_machine::SessionPhase},
};

/// Create a live session from a stored quiz and register it.
pub async fn create_session(
    state: &SharedState,
    request: CreateSessionRequest,
) -> Result<CreateSessionResponse, ServiceError> {
    let store = state.require_quiz_store().await?;

    let Some(record) = store.fetch_quiz(request.quiz_id.clone()).await? else {
        return Err(ServiceError::NotFound(format!(
            "quiz `{}` not found",
            request.quiz_id
        )));
    };

    let snapshot = build_quiz_snapshot(record, state)?;
    let quiz_title = snapshot.title.clone();
    let handle = state.registry().create_session(request.admin_id, snapshot)?;

    let (session_id, code) = handle
        .read_data(|session| (session.id.clone(), session.code.clone()))
        .await;

    info!(session = %session_id, code = %code, "live session created");
    live_events::broadcast_session_created(
        state,
        &SessionCreatedEvent {
            session_id: session_id.clone(),
            code: code.clone(),
            quiz_title,
        },
    );

    Ok(CreateSessionResponse { session_id, code })
}

/// Join a waiting session by code. Safe to call from many concurrent joiners;
/// the roster append is atomic per session.
pub async fn join(
    state: &SharedState,
    code: &str,
    name: &str,
) -> Result<(Arc<SessionHandle>, String, ParticipantSummary), ServiceError> {
    let Some(handle) = state.registry().get_by_code(code) else {
        return Err(ServiceError::NotFound(format!(
            "no session with code `{}`",
            code.trim().to_ascii_uppercase()
        )));
    };

    if handle.phase().await != SessionPhase::Lobby {
        return Err(ServiceError::InvalidState(
            "session already started or finished".into(),
        ));
    }

    validate_display_name(name)
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let (session_id, summary) = handle
        .with_data_mut(|session| {
            // The phase check above raced any concurrent start; the first
            // question being set is the in-lock signal that we lost.
            if session.current_question.is_some() {
                return Err(ServiceError::InvalidState(
                    "session already started or finished".into(),
                ));
            }

            let participant = Participant::new(name.trim().to_owned());
            let summary = ParticipantSummary::from(&participant);
            session.participants.insert(participant.id, participant);

            Ok((session.id.clone(), summary))
        })
        .await?;

    handle.touch().await;
    info!(session = %session_id, participant = %summary.id, name = %summary.name, "participant joined");

    live_events::publish(
        &handle,
        Audience::Everyone,
        &LiveEvent::ParticipantJoined {
            participant: summary.clone(),
        },
    );

    Ok((handle, session_id, summary))
}

/// Resolve an existing participant for a reconnecting transport.
///
/// Reconnection never creates a duplicate: the logical participant survives
/// the connection, and the caller re-binds the fresh socket to it.
pub async fn rejoin(
    state: &SharedState,
    session_id: &str,
    participant_id: Uuid,
) -> Result<(Arc<SessionHandle>, ParticipantSummary), ServiceError> {
    let Some(handle) = state.registry().get(session_id) else {
        return Err(ServiceError::NotFound(format!(
            "session `{session_id}` not found"
        )));
    };

    let summary = handle
        .read_data(|session| session.participants.get(&participant_id).map(ParticipantSummary::from))
        .await
        .ok_or_else(|| {
            ServiceError::NotFound(format!("participant `{participant_id}` not found"))
        })?;

    handle.touch().await;
    Ok((handle, summary))
}

/// Remove a participant from the roster. Idempotent if already absent.
pub async fn leave(
    handle: &Arc<SessionHandle>,
    participant_id: Uuid,
) -> Result<(), ServiceError> {
    let removed = handle
        .with_data_mut(|session| Ok(session.participants.shift_remove(&participant_id).is_some()))
        .await?;

    handle.players().remove(&participant_id);

    if removed {
        handle.touch().await;
        live_events::publish(
            handle,
            Audience::Everyone,
            &LiveEvent::ParticipantLeft { participant_id },
        );
    }

    Ok(())
}

/// Start a waiting session: ownership check, roster policy, then the quiz
/// flow takes over with question zero.
pub async fn start(
    state: &SharedState,
    session_id: &str,
    request: StartSessionRequest,
) -> Result<(), ServiceError> {
    let Some(handle) = state.registry().get(session_id) else {
        return Err(ServiceError::NotFound(format!(
            "session `{session_id}` not found"
        )));
    };

    let (owner, roster_empty) = handle
        .read_data(|session| (session.admin_id.clone(), session.participants.is_empty()))
        .await;

    if owner != request.admin_id {
        return Err(ServiceError::Unauthorized(
            "only the owning admin may start the session".into(),
        ));
    }

    if roster_empty {
        if !request.force {
            return Err(ServiceError::InvalidState(
                "no participants have joined".into(),
            ));
        }
        if !state.config().allow_force_start {
            return Err(ServiceError::InvalidState(
                "force start is disabled by configuration".into(),
            ));
        }
        // Participants can be live on the transport before the roster shows
        // them; the override exists for exactly that situation.
        warn!(session = %session_id, "force-starting session with an empty roster");
    }

    flow_service::start_quiz(state, &handle).await
}

/// Tear a session down on explicit admin request.
pub async fn destroy(
    state: &SharedState,
    session_id: &str,
    admin_id: &str,
) -> Result<(), ServiceError> {
    let Some(handle) = state.registry().get(session_id) else {
        return Err(ServiceError::NotFound(format!(
            "session `{session_id}` not found"
        )));
    };

    let owner = handle.read_data(|session| session.admin_id.clone()).await;
    if owner != admin_id {
        return Err(ServiceError::Unauthorized(
            "only the owning admin may end the session".into(),
        ));
    }

    handle.cancel_timer().await;
    live_events::publish(&handle, Audience::Everyone, &LiveEvent::SessionEnded);
    state.registry().remove(session_id);
    info!(session = %session_id, "session destroyed by admin");

    Ok(())
}

/// Summaries of every registered session, for the admin overview.
pub async fn list_sessions(state: &SharedState) -> Vec<SessionSummary> {
    let mut summaries = Vec::new();
    for handle in state.registry().sessions() {
        summaries.push(summarize(&handle).await);
    }
    summaries
}

/// Summary of one session by id.
pub async fn get_session(
    state: &SharedState,
    session_id: &str,
) -> Result<SessionSummary, ServiceError> {
    let Some(handle) = state.registry().get(session_id) else {
        return Err(ServiceError::NotFound(format!(
            "session `{session_id}` not found"
        )));
    };
    Ok(summarize(&handle).await)
}

/// Catalogue listing for the admin quiz picker.
pub async fn list_quizzes(state: &SharedState) -> Result<Vec<QuizListEntry>, ServiceError> {
    let store = state.require_quiz_store().await?;
    let items = store.list_quizzes().await?;
    Ok(items.into_iter().map(Into::into).collect())
}

/// Project a handle into a client-facing summary.
pub async fn summarize(handle: &Arc<SessionHandle>) -> SessionSummary {
    let status = handle.phase().await.into();
    handle
        .read_data(|session| SessionSummary::new(session, status))
        .await
}

/// Validate a stored quiz and snapshot it for a session's lifetime.
fn build_quiz_snapshot(
    record: QuizRecord,
    state: &SharedState,
) -> Result<QuizSnapshot, ServiceError> {
    if record.questions.is_empty() {
        return Err(ServiceError::InvalidState(format!(
            "quiz `{}` has no questions",
            record.id
        )));
    }

    for (index, question) in record.questions.iter().enumerate() {
        if question.text.trim().is_empty() {
            return Err(ServiceError::InvalidState(format!(
                "quiz `{}` question {index} has no text",
                record.id
            )));
        }
        if question.options.len() < 2 {
            return Err(ServiceError::InvalidState(format!(
                "quiz `{}` question {index} needs at least two options",
                record.id
            )));
        }
        if question.correct_option >= question.options.len() {
            return Err(ServiceError::InvalidState(format!(
                "quiz `{}` question {index} marks a nonexistent option as correct",
                record.id
            )));
        }
    }

    let time_limit_secs = record
        .time_limit_secs
        .unwrap_or(state.config().question_time_limit_secs);

    Ok(QuizSnapshot {
        quiz_id: record.id,
        title: record.title,
        questions: record
            .questions
            .into_iter()
            .map(|question| crate::state::session::QuestionSnapshot {
                text: question.text,
                options: question.options,
                correct_option: question.correct_option,
            })
            .collect(),
        time_limit_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::{models::QuestionRecord, quiz_store::memory::MemoryQuizStore},
        state::AppState,
    };

    fn quiz_record(questions: usize) -> QuizRecord {
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
            time_limit_secs: Some(20),
        }
    }

    async fn test_state(config: AppConfig) -> SharedState {
        let state = AppState::new(config);
        let store = MemoryQuizStore::new();
        store.insert(quiz_record(3)).await;
        state.set_quiz_store(Arc::new(store)).await;
        state
    }

    async fn created(state: &SharedState) -> CreateSessionResponse {
        create_session(
            state,
            CreateSessionRequest {
                quiz_id: "quiz-1".into(),
                admin_id: "admin-1".into(),
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn create_rejects_unknown_quiz() {
        let state = test_state(AppConfig::default()).await;
        let err = create_session(
            &state,
            CreateSessionRequest {
                quiz_id: "missing".into(),
                admin_id: "admin-1".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn roster_tracks_joins_and_leaves() {
        let state = test_state(AppConfig::default()).await;
        let session = created(&state).await;

        let (handle, _, ava) = join(&state, &session.code, "Ava").await.unwrap();
        let (_, _, _ben) = join(&state, &session.code, "Ben").await.unwrap();
        let (_, _, _cy) = join(&state, &session.code, "Cy").await.unwrap();

        assert_eq!(
            handle.read_data(|session| session.participants.len()).await,
            3
        );

        leave(&handle, ava.id).await.unwrap();
        // Leaving twice is a no-op.
        leave(&handle, ava.id).await.unwrap();

        assert_eq!(
            handle.read_data(|session| session.participants.len()).await,
            2
        );
    }

    #[tokio::test]
    async fn join_is_case_insensitive_on_the_code() {
        let state = test_state(AppConfig::default()).await;
        let session = created(&state).await;

        let lowered = session.code.to_ascii_lowercase();
        let (_, session_id, _) = join(&state, &lowered, "Ava").await.unwrap();
        assert_eq!(session_id, session.session_id);
    }

    #[tokio::test]
    async fn join_rejects_unknown_code_and_blank_name() {
        let state = test_state(AppConfig::default()).await;
        let session = created(&state).await;

        let err = join(&state, "ZZZZZZ", "Ava").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let err = join(&state, &session.code, "   ").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn join_after_start_is_rejected() {
        let state = test_state(AppConfig::default()).await;
        let session = created(&state).await;
        join(&state, &session.code, "Ava").await.unwrap();

        start(
            &state,
            &session.session_id,
            StartSessionRequest {
                admin_id: "admin-1".into(),
                force: false,
            },
        )
        .await
        .unwrap();

        let err = join(&state, &session.code, "Late").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn start_requires_the_owning_admin() {
        let state = test_state(AppConfig::default()).await;
        let session = created(&state).await;
        join(&state, &session.code, "Ava").await.unwrap();

        let err = start(
            &state,
            &session.session_id,
            StartSessionRequest {
                admin_id: "impostor".into(),
                force: false,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn empty_roster_start_is_rejected_without_the_force_flag() {
        let state = test_state(AppConfig::default()).await;
        let session = created(&state).await;

        let err = start(
            &state,
            &session.session_id,
            StartSessionRequest {
                admin_id: "admin-1".into(),
                force: false,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn force_start_succeeds_when_the_policy_allows_it() {
        let state = test_state(AppConfig::default()).await;
        let session = created(&state).await;

        start(
            &state,
            &session.session_id,
            StartSessionRequest {
                admin_id: "admin-1".into(),
                force: true,
            },
        )
        .await
        .unwrap();

        let handle = state.registry().get(&session.session_id).unwrap();
        assert_eq!(
            handle.read_data(|session| session.current_question).await,
            Some(0)
        );
    }

    #[tokio::test]
    async fn force_start_is_rejected_when_the_policy_disables_it() {
        let config = AppConfig {
            allow_force_start: false,
            ..AppConfig::default()
        };
        let state = test_state(config).await;
        let session = created(&state).await;

        let err = start(
            &state,
            &session.session_id,
            StartSessionRequest {
                admin_id: "admin-1".into(),
                force: true,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn rejoin_resolves_the_same_logical_participant() {
        let state = test_state(AppConfig::default()).await;
        let session = created(&state).await;
        let (_, session_id, ava) = join(&state, &session.code, "Ava").await.unwrap();

        let (_, resolved) = rejoin(&state, &session_id, ava.id).await.unwrap();
        assert_eq!(resolved.id, ava.id);
        assert_eq!(resolved.name, "Ava");

        let err = rejoin(&state, &session_id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn destroy_checks_ownership_and_removes_the_session() {
        let state = test_state(AppConfig::default()).await;
        let session = created(&state).await;

        let err = destroy(&state, &session.session_id, "impostor")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        destroy(&state, &session.session_id, "admin-1").await.unwrap();
        assert!(state.registry().get(&session.session_id).is_none());
        assert!(state.registry().get_by_code(&session.code).is_none());
    }
}
