use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Client, Collection, Database, bson::doc};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoQuizDocument, doc_id},
};
use crate::dao::{
    models::{QuizListItem, QuizRecord},
    quiz_store::QuizStore,
    store::StoreResult,
};

const QUIZ_COLLECTION_NAME: &str = "quizzes";

#[derive(Clone)]
pub struct MongoQuizStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoQuizStore {
    /// Establish a connection to MongoDB.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        Ok(Self { inner })
    }

    async fn collection(&self) -> Collection<MongoQuizDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoQuizDocument>(QUIZ_COLLECTION_NAME)
    }

    async fn fetch_quiz(&self, id: String) -> MongoResult<Option<QuizRecord>> {
        let collection = self.collection().await;

        let document = collection
            .find_one(doc_id(&id))
            .await
            .map_err(|source| MongoDaoError::LoadQuiz { id, source })?;

        Ok(document.map(Into::into))
    }

    async fn list_quizzes(&self) -> MongoResult<Vec<QuizListItem>> {
        let collection = self.collection().await;

        let documents: Vec<MongoQuizDocument> = collection
            .find(doc! {})
            .await
            .map_err(|source| MongoDaoError::ListQuizzes { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListQuizzes { source })?;

        Ok(documents
            .into_iter()
            .map(|document| {
                let record: QuizRecord = document.into();
                (&record).into()
            })
            .collect())
    }
}

impl QuizStore for MongoQuizStore {
    fn fetch_quiz(&self, id: String) -> BoxFuture<'static, StoreResult<Option<QuizRecord>>> {
        let store = self.clone();
        Box::pin(async move { store.fetch_quiz(id).await.map_err(Into::into) })
    }

    fn list_quizzes(&self) -> BoxFuture<'static, StoreResult<Vec<QuizListItem>>> {
        let store = self.clone();
        Box::pin(async move { store.list_quizzes().await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StoreResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
