pub mod registry;
pub mod session;
mod sse;
pub mod state_machine;

use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use uuid::Uuid;

use crate::{config::AppConfig, dao::quiz_store::QuizStore, error::ServiceError};

pub use self::registry::{DEFAULT_TRANSITION_TIMEOUT, QuestionTimer, SessionHandle, SessionRegistry};
pub use self::sse::{AdminSseState, SseHub};

/// Shared ownership handle to the application state.
pub type SharedState = Arc<AppState>;

/// Capacity of the global admin SSE broadcast channel.
const ADMIN_CHANNEL_CAPACITY: usize = 16;

#[derive(Clone)]
/// Handle used to push messages to a connected player socket.
pub struct PlayerConnection {
    /// Logical participant this connection is bound to.
    pub participant_id: Uuid,
    /// Outbound message channel of the socket's writer task.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Central application state: session registry, realtime channels, quiz store
/// handle, and runtime configuration.
///
/// Constructed once at server start and injected everywhere; cleared by
/// process shutdown. No component reaches for ambient globals.
pub struct AppState {
    quiz_store: RwLock<Option<Arc<dyn QuizStore>>>,
    registry: SessionRegistry,
    admin_sse: AdminSseState,
    degraded: watch::Sender<bool>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a quiz store is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            quiz_store: RwLock::new(None),
            registry: SessionRegistry::new(config.join_code_length),
            admin_sse: AdminSseState::new(ADMIN_CHANNEL_CAPACITY),
            degraded: degraded_tx,
            config,
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Registry of live sessions.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Obtain a handle to the current quiz store, if one is installed.
    pub async fn quiz_store(&self) -> Option<Arc<dyn QuizStore>> {
        let guard = self.quiz_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the quiz store or fail with a degraded-mode error.
    pub async fn require_quiz_store(&self) -> Result<Arc<dyn QuizStore>, ServiceError> {
        self.quiz_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a quiz store implementation and leave degraded mode.
    pub async fn set_quiz_store(&self, store: Arc<dyn QuizStore>) {
        {
            let mut guard = self.quiz_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        if self.is_degraded() == value {
            return;
        }

        let _ = self.degraded.send(value);
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Broadcast hub used for the global admin SSE stream.
    pub fn admin_sse(&self) -> &SseHub {
        self.admin_sse.hub()
    }

    /// Token guard that ensures a single admin SSE subscriber at a time.
    pub fn admin_token(&self) -> &Mutex<Option<String>> {
        self.admin_sse.token()
    }
}
