use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;

/// High-level phases a live session can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Session exists and participants can join; nothing has been played yet.
    Lobby,
    /// The quiz is running and cycling through the per-question sub-phases.
    Active(ActivePhase),
    /// Final ranking has been published; the session is terminal.
    Finished,
}

/// Fine-grained phase while the quiz is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivePhase {
    /// A question is on screen and answers are being collected.
    Question,
    /// Per-option counts and the correct answer are being shown.
    Results,
}

/// Indicates why a session transitioned to the terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// Every question of the quiz has been played.
    QuizCompleted,
    /// The admin stopped the session before the last question.
    ManualStop,
}

/// Events that can be applied to the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowEvent {
    /// Admin starts the quiz from the lobby; the first question goes live.
    StartQuiz,
    /// Move from the results of one question to showing the next.
    ShowQuestion,
    /// Close the current question and show per-option results.
    Reveal,
    /// Publish the final ranking and terminate the session.
    Finish(FinishReason),
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: SessionPhase,
    /// The event that cannot be applied from this phase.
    pub event: FlowEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// State machine phase changed since the plan was created.
    PhaseMismatch {
        /// Phase when plan was created.
        expected: SessionPhase,
        /// Current phase.
        actual: SessionPhase,
    },
    /// State machine version changed since the plan was created.
    VersionMismatch {
        /// Version when plan was created.
        expected: usize,
        /// Current version.
        actual: usize,
    },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A planned state machine transition that has been validated but not yet applied.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the state machine is currently in.
    pub from: SessionPhase,
    /// Phase the state machine will transition to.
    pub to: SessionPhase,
    /// Event that triggered this transition.
    pub event: FlowEvent,
    /// Version number after applying this transition.
    pub version_next: usize,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase of the state machine.
    pub phase: SessionPhase,
    /// Version number of the state machine (increments on each transition).
    pub version: usize,
    /// Pending transition phase, if a transition is planned but not yet applied.
    pub pending: Option<SessionPhase>,
}

/// State machine implementing the lobby / question / results / finished flow
/// of a live quiz session.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    phase: SessionPhase,
    version: usize,
    pending: Option<Plan>,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Lobby,
            version: 0,
            pending: None,
        }
    }
}

impl SessionStateMachine {
    /// Create a new state machine initialised in the lobby state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
            pending: self.pending.as_ref().map(|plan| plan.to),
        }
    }

    /// Plan a transition by validating that the event can be applied from the current phase.
    /// Returns a Plan that can later be applied or aborted.
    pub fn plan(&mut self, event: FlowEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to: next,
            event,
            version_next: self.version + 1,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition, moving the state machine to the next phase.
    /// Returns the new phase after the transition.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<SessionPhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.phase = plan.to;
        self.version = plan.version_next;
        self.pending = None;

        Ok(self.phase)
    }

    /// Abort a planned transition without applying it, returning the state machine to its previous state.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: FlowEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (SessionPhase::Lobby, FlowEvent::StartQuiz) => {
                SessionPhase::Active(ActivePhase::Question)
            }
            (SessionPhase::Active(ActivePhase::Question), FlowEvent::Reveal) => {
                SessionPhase::Active(ActivePhase::Results)
            }
            (SessionPhase::Active(ActivePhase::Results), FlowEvent::ShowQuestion) => {
                SessionPhase::Active(ActivePhase::Question)
            }
            (SessionPhase::Active(_), FlowEvent::Finish(..)) => SessionPhase::Finished,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut SessionStateMachine, event: FlowEvent) -> SessionPhase {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap()
    }

    #[test]
    fn initial_state_is_lobby() {
        let sm = SessionStateMachine::new();
        assert_eq!(sm.phase(), SessionPhase::Lobby);
    }

    #[test]
    fn full_happy_path_through_session() {
        let mut sm = SessionStateMachine::new();

        assert_eq!(
            apply(&mut sm, FlowEvent::StartQuiz),
            SessionPhase::Active(ActivePhase::Question)
        );
        assert_eq!(
            apply(&mut sm, FlowEvent::Reveal),
            SessionPhase::Active(ActivePhase::Results)
        );
        assert_eq!(
            apply(&mut sm, FlowEvent::ShowQuestion),
            SessionPhase::Active(ActivePhase::Question)
        );
        assert_eq!(
            apply(&mut sm, FlowEvent::Reveal),
            SessionPhase::Active(ActivePhase::Results)
        );
        assert_eq!(
            apply(&mut sm, FlowEvent::Finish(FinishReason::QuizCompleted)),
            SessionPhase::Finished
        );
    }

    #[test]
    fn manual_stop_terminates_from_question() {
        let mut sm = SessionStateMachine::new();
        apply(&mut sm, FlowEvent::StartQuiz);

        assert_eq!(
            apply(&mut sm, FlowEvent::Finish(FinishReason::ManualStop)),
            SessionPhase::Finished
        );
    }

    #[test]
    fn question_cannot_be_shown_while_one_is_live() {
        let mut sm = SessionStateMachine::new();
        apply(&mut sm, FlowEvent::StartQuiz);

        let err = sm.plan(FlowEvent::ShowQuestion).unwrap_err();
        match err {
            PlanError::InvalidTransition(InvalidTransition { from, event }) => {
                assert_eq!(from, SessionPhase::Active(ActivePhase::Question));
                assert_eq!(event, FlowEvent::ShowQuestion);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn invalid_transition_returns_error() {
        let mut sm = SessionStateMachine::new();
        let err = sm.plan(FlowEvent::Reveal).unwrap_err();
        match err {
            PlanError::InvalidTransition(invalid) => {
                assert_eq!(invalid.from, SessionPhase::Lobby);
                assert_eq!(invalid.event, FlowEvent::Reveal);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn finished_session_accepts_no_events() {
        let mut sm = SessionStateMachine::new();
        apply(&mut sm, FlowEvent::StartQuiz);
        apply(&mut sm, FlowEvent::Finish(FinishReason::ManualStop));

        assert!(sm.plan(FlowEvent::StartQuiz).is_err());
        assert!(sm.plan(FlowEvent::ShowQuestion).is_err());
        assert!(sm.plan(FlowEvent::Reveal).is_err());
    }

    #[test]
    fn plan_while_pending_is_rejected() {
        let mut sm = SessionStateMachine::new();
        let _plan = sm.plan(FlowEvent::StartQuiz).unwrap();
        assert_eq!(
            sm.plan(FlowEvent::StartQuiz).unwrap_err(),
            PlanError::AlreadyPending
        );
    }

    #[test]
    fn abort_clears_pending() {
        let mut sm = SessionStateMachine::new();
        let plan = sm.plan(FlowEvent::StartQuiz).unwrap();
        sm.abort(plan.id).unwrap();
        assert!(sm.pending.is_none());
        assert_eq!(sm.phase(), SessionPhase::Lobby);
    }

    #[test]
    fn apply_with_wrong_plan_id_is_rejected() {
        let mut sm = SessionStateMachine::new();
        let plan = sm.plan(FlowEvent::StartQuiz).unwrap();
        let err = sm.apply(Uuid::new_v4()).unwrap_err();
        match err {
            ApplyError::IdMismatch { expected, .. } => assert_eq!(expected, plan.id),
            other => panic!("unexpected error: {other:?}"),
        }
        // The original plan must still be applicable.
        assert_eq!(
            sm.apply(plan.id).unwrap(),
            SessionPhase::Active(ActivePhase::Question)
        );
    }
}
