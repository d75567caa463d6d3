pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;

use crate::dao::models::{QuizListItem, QuizRecord};
use crate::dao::store::StoreResult;

/// Abstraction over the quiz catalogue consumed by the live-session core.
///
/// The live flow only ever reads: quizzes are snapshotted once at session
/// creation and never written back.
pub trait QuizStore: Send + Sync {
    fn fetch_quiz(&self, id: String) -> BoxFuture<'static, StoreResult<Option<QuizRecord>>>;
    fn list_quizzes(&self) -> BoxFuture<'static, StoreResult<Vec<QuizListItem>>>;
    fn health_check(&self) -> BoxFuture<'static, StoreResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StoreResult<()>>;
}
