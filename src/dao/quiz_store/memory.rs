use std::{collections::HashMap, sync::Arc};

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::dao::{
    models::{QuizListItem, QuizRecord},
    quiz_store::QuizStore,
    store::StoreResult,
};

/// In-memory quiz catalogue.
///
/// Used by the test suite and by deployments that seed a fixed quiz set at
/// startup instead of running a database.
#[derive(Clone, Default)]
pub struct MemoryQuizStore {
    quizzes: Arc<RwLock<HashMap<String, QuizRecord>>>,
}

impl MemoryQuizStore {
    /// Create an empty catalogue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a quiz record.
    pub async fn insert(&self, quiz: QuizRecord) {
        let mut guard = self.quizzes.write().await;
        guard.insert(quiz.id.clone(), quiz);
    }
}

impl QuizStore for MemoryQuizStore {
    fn fetch_quiz(&self, id: String) -> BoxFuture<'static, StoreResult<Option<QuizRecord>>> {
        let store = self.clone();
        Box::pin(async move {
            let guard = store.quizzes.read().await;
            Ok(guard.get(&id).cloned())
        })
    }

    fn list_quizzes(&self) -> BoxFuture<'static, StoreResult<Vec<QuizListItem>>> {
        let store = self.clone();
        Box::pin(async move {
            let guard = store.quizzes.read().await;
            Ok(guard.values().map(Into::into).collect())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StoreResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StoreResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
