use std::{
    sync::Arc,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use dashmap::{DashMap, mapref::entry::Entry};
use rand::seq::IndexedRandom;
use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
    time::timeout,
};
use tracing::warn;
use uuid::Uuid;

use crate::{
    error::ServiceError,
    state::{
        PlayerConnection,
        session::{LiveSession, QuizSnapshot},
        sse::SseHub,
        state_machine::{FlowEvent, Plan, PlanId, SessionPhase, SessionStateMachine, Snapshot},
    },
};

/// Join codes avoid characters that read ambiguously on a projector.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
/// Upper bound on collision retries before we give up; with a 32-char
/// alphabet and 6-char codes this is effectively unreachable.
const CODE_GENERATION_ATTEMPTS: usize = 64;

/// Capacity of each per-session viewer broadcast channel.
const VIEWER_CHANNEL_CAPACITY: usize = 16;

/// Maximum time a session transition's work section may run before the plan
/// is aborted.
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);

/// Countdown armed while a question is live. Aborting the task cancels the
/// pending auto-reveal.
pub struct QuestionTimer {
    /// Question index the timer was armed for.
    pub question_index: usize,
    handle: JoinHandle<()>,
}

impl QuestionTimer {
    /// Wrap a spawned countdown task.
    pub fn new(question_index: usize, handle: JoinHandle<()>) -> Self {
        Self {
            question_index,
            handle,
        }
    }

    /// Cancel the pending auto-reveal.
    pub fn cancel(self) {
        self.handle.abort();
    }
}

/// Shared handle to one live session: its data, state machine, realtime
/// channels, countdown timer, and the gate serializing mutations.
pub struct SessionHandle {
    machine: RwLock<SessionStateMachine>,
    data: RwLock<LiveSession>,
    viewers: SseHub,
    players: DashMap<Uuid, PlayerConnection>,
    timer: Mutex<Option<QuestionTimer>>,
    transition_gate: Mutex<()>,
    transition_timeout: Option<Duration>,
    last_activity: Mutex<Instant>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle").finish_non_exhaustive()
    }
}

impl SessionHandle {
    fn new(data: LiveSession) -> Arc<Self> {
        Arc::new(Self {
            machine: RwLock::new(SessionStateMachine::new()),
            data: RwLock::new(data),
            viewers: SseHub::new(VIEWER_CHANNEL_CAPACITY),
            players: DashMap::new(),
            timer: Mutex::new(None),
            transition_gate: Mutex::new(()),
            transition_timeout: Some(DEFAULT_TRANSITION_TIMEOUT),
            last_activity: Mutex::new(Instant::now()),
        })
    }

    /// Snapshot the current phase of the session state machine.
    pub async fn phase(&self) -> SessionPhase {
        self.machine.read().await.phase()
    }

    /// Snapshot phase, version, and pending transition.
    pub async fn snapshot(&self) -> Snapshot {
        self.machine.read().await.snapshot()
    }

    /// Broadcast hub feeding this session's viewer SSE stream.
    pub fn viewers(&self) -> &SseHub {
        &self.viewers
    }

    /// Registry of connected player sockets keyed by participant id.
    pub fn players(&self) -> &DashMap<Uuid, PlayerConnection> {
        &self.players
    }

    /// Run a read-only closure against the session data.
    pub async fn read_data<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&LiveSession) -> T,
    {
        let guard = self.data.read().await;
        f(&guard)
    }

    /// Run a mutating closure against the session data.
    ///
    /// Callers that change phase must go through [`Self::run_transition`]
    /// instead so the mutation stays atomic with the phase change.
    pub async fn with_data_mut<F, T>(&self, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut LiveSession) -> Result<T, ServiceError>,
    {
        let mut guard = self.data.write().await;
        f(&mut guard)
    }

    /// Record activity on this session, deferring idle eviction.
    pub async fn touch(&self) {
        let mut guard = self.last_activity.lock().await;
        *guard = Instant::now();
    }

    /// How long the session has been idle.
    pub async fn idle_for(&self) -> Duration {
        let guard = self.last_activity.lock().await;
        guard.elapsed()
    }

    /// Install a countdown timer, cancelling any previous one.
    pub async fn arm_timer(&self, timer: QuestionTimer) {
        let mut guard = self.timer.lock().await;
        if let Some(previous) = guard.take() {
            previous.cancel();
        }
        *guard = Some(timer);
    }

    /// Cancel the pending countdown, if one is armed.
    pub async fn cancel_timer(&self) {
        let mut guard = self.timer.lock().await;
        if let Some(timer) = guard.take() {
            timer.cancel();
        }
    }

    /// Drop the countdown slot without aborting the task. Used by the expiry
    /// path itself, which must not cancel its own task mid-reveal.
    pub async fn disarm_timer(&self) {
        let mut guard = self.timer.lock().await;
        guard.take();
    }

    async fn plan_transition(&self, event: FlowEvent) -> Result<Plan, ServiceError> {
        let mut machine = self.machine.write().await;
        machine.plan(event).map_err(Into::into)
    }

    async fn apply_planned_transition(&self, plan_id: PlanId) -> Result<SessionPhase, ServiceError> {
        let mut machine = self.machine.write().await;
        machine.apply(plan_id).map_err(Into::into)
    }

    async fn abort_transition(&self, plan_id: PlanId) {
        let mut machine = self.machine.write().await;
        if let Err(err) = machine.abort(plan_id) {
            warn!(plan_id = %plan_id, error = ?err, "failed to abort planned transition");
        }
    }

    /// Plan a state transition, run `work` while it is pending, then apply it.
    ///
    /// The per-session gate serializes every transition, so concurrent admin
    /// actions and timer expiries resolve one at a time. When `work` fails or
    /// exceeds the timeout the plan is aborted and the session is left
    /// untouched.
    pub async fn run_transition<F, Fut, T>(
        &self,
        event: FlowEvent,
        work: F,
    ) -> Result<(T, SessionPhase), ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.transition_gate.lock().await;
        let Plan { id: plan_id, .. } = self.plan_transition(event).await?;

        let work_future = work();
        let outcome = if let Some(limit) = self.transition_timeout {
            match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => {
                    self.abort_transition(plan_id).await;
                    drop(gate);
                    return Err(ServiceError::Timeout);
                }
            }
        } else {
            work_future.await
        };

        match outcome {
            Ok(value) => {
                let next = self.apply_planned_transition(plan_id).await?;
                self.touch().await;
                drop(gate);
                Ok((value, next))
            }
            Err(err) => {
                self.abort_transition(plan_id).await;
                drop(gate);
                Err(err)
            }
        }
    }
}

/// Process-wide registry of live sessions, indexed by id and join code.
///
/// Constructed once at server start and injected through `AppState`; nothing
/// else holds session ownership.
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<SessionHandle>>,
    codes: DashMap<String, String>,
    code_length: usize,
}

impl SessionRegistry {
    /// Create an empty registry generating codes of `code_length` characters.
    pub fn new(code_length: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            codes: DashMap::new(),
            code_length,
        }
    }

    /// Create a session for `quiz` owned by `admin_id`, allocating a fresh id
    /// and a join code unique among non-finished sessions.
    pub fn create_session(
        &self,
        admin_id: String,
        quiz: QuizSnapshot,
    ) -> Result<Arc<SessionHandle>, ServiceError> {
        let id = generate_session_id();
        let code = self.claim_code(&id)?;

        let session = LiveSession::new(id.clone(), code, admin_id, quiz);
        let handle = SessionHandle::new(session);
        self.sessions.insert(id, handle.clone());

        Ok(handle)
    }

    /// Look up a session by its identifier.
    pub fn get(&self, id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Look up a session by join code; comparison is case-insensitive.
    pub fn get_by_code(&self, code: &str) -> Option<Arc<SessionHandle>> {
        let normalized = code.trim().to_ascii_uppercase();
        let id = self.codes.get(&normalized).map(|entry| entry.value().clone())?;
        self.get(&id)
    }

    /// Remove a session and free its join code. Idempotent.
    pub fn remove(&self, id: &str) -> Option<Arc<SessionHandle>> {
        let (_, handle) = self.sessions.remove(id)?;
        self.codes.retain(|_, session_id| session_id != id);
        Some(handle)
    }

    /// Free a finished session's join code for reuse while keeping the
    /// session itself addressable by id.
    pub fn release_code(&self, code: &str) {
        self.codes.remove(&code.to_ascii_uppercase());
    }

    /// Snapshot of every registered session handle.
    pub fn sessions(&self) -> Vec<Arc<SessionHandle>> {
        self.sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Reserve an unused join code for `session_id`, retrying on collision.
    /// The entry API makes the check-and-claim atomic under concurrent creates.
    fn claim_code(&self, session_id: &str) -> Result<String, ServiceError> {
        let mut rng = rand::rng();

        for _ in 0..CODE_GENERATION_ATTEMPTS {
            let code: String = (0..self.code_length)
                .map(|_| {
                    let byte = CODE_ALPHABET
                        .choose(&mut rng)
                        .copied()
                        .unwrap_or(b'A');
                    byte as char
                })
                .collect();

            match self.codes.entry(code.clone()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    slot.insert(session_id.to_owned());
                    return Ok(code);
                }
            }
        }

        Err(ServiceError::Internal(
            "could not allocate a unique join code".into(),
        ))
    }
}

/// Opaque time-derived session identifier. The random suffix keeps ids unique
/// when two sessions are created within the same millisecond.
fn generate_session_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis());
    let suffix = Uuid::new_v4().simple().to_string();
    format!("session-{millis:x}-{}", &suffix[..8])
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::state::session::QuestionSnapshot;

    fn quiz() -> QuizSnapshot {
        QuizSnapshot {
            quiz_id: "quiz-1".into(),
            title: "Capitals".into(),
            questions: vec![QuestionSnapshot {
                text: "Capital of France?".into(),
                options: vec!["Paris".into(), "Lyon".into()],
                correct_option: 0,
            }],
            time_limit_secs: 20,
        }
    }

    #[tokio::test]
    async fn created_sessions_get_distinct_codes() {
        let registry = SessionRegistry::new(6);
        let mut codes = HashSet::new();

        for _ in 0..50 {
            let handle = registry.create_session("admin-1".into(), quiz()).unwrap();
            let code = handle.read_data(|session| session.code.clone()).await;
            assert_eq!(code.len(), 6);
            assert!(codes.insert(code), "duplicate join code allocated");
        }

        assert_eq!(registry.len(), 50);
    }

    #[tokio::test]
    async fn lookup_by_code_is_case_insensitive() {
        let registry = SessionRegistry::new(6);
        let handle = registry.create_session("admin-1".into(), quiz()).unwrap();
        let (id, code) = handle
            .read_data(|session| (session.id.clone(), session.code.clone()))
            .await;

        let found = registry.get_by_code(&code.to_ascii_lowercase()).unwrap();
        assert_eq!(found.read_data(|session| session.id.clone()).await, id);

        assert!(registry.get_by_code("NOSUCH").is_none());
    }

    #[tokio::test]
    async fn removing_a_session_frees_its_code() {
        let registry = SessionRegistry::new(6);
        let handle = registry.create_session("admin-1".into(), quiz()).unwrap();
        let (id, code) = handle
            .read_data(|session| (session.id.clone(), session.code.clone()))
            .await;

        assert!(registry.remove(&id).is_some());
        assert!(registry.get(&id).is_none());
        assert!(registry.get_by_code(&code).is_none());
        assert!(registry.remove(&id).is_none());
    }

    #[tokio::test]
    async fn released_code_no_longer_resolves_but_session_remains() {
        let registry = SessionRegistry::new(6);
        let handle = registry.create_session("admin-1".into(), quiz()).unwrap();
        let (id, code) = handle
            .read_data(|session| (session.id.clone(), session.code.clone()))
            .await;

        registry.release_code(&code);
        assert!(registry.get_by_code(&code).is_none());
        assert!(registry.get(&id).is_some());
    }
}
