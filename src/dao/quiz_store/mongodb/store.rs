use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Client, Collection, Database, IndexModel, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoEntryDocument, MongoQuestionDocument, doc_id, ranking_order},
};
use crate::dao::{
    models::{LeaderboardEntryEntity, NewLeaderboardEntry, QuestionEntity},
    quiz_store::QuizStore,
    storage::StorageResult,
};

const QUESTION_COLLECTION_NAME: &str = "questions";
const LEADERBOARD_COLLECTION_NAME: &str = "leaderboard";

/// [`QuizStore`] backed by MongoDB; ranking is sorted and limited server-side.
#[derive(Clone)]
pub struct MongoQuizStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    // Kept alive alongside the database handle it produced.
    #[allow(dead_code)]
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
        let (client, database) = establish_connection(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoQuizStore {
    /// Establish a connection to MongoDB and ensure the ranking index is present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = establish_connection(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let index = IndexModel::builder()
            .keys(ranking_order())
            .options(
                IndexOptions::builder()
                    .name(Some("leaderboard_rank_idx".to_owned()))
                    .build(),
            )
            .build();

        self.entry_collection()
            .await
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: LEADERBOARD_COLLECTION_NAME,
                index: "score,timestamp_ms",
                source,
            })?;

        Ok(())
    }

    async fn question_collection(&self) -> Collection<MongoQuestionDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoQuestionDocument>(QUESTION_COLLECTION_NAME)
    }

    async fn entry_collection(&self) -> Collection<MongoEntryDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoEntryDocument>(LEADERBOARD_COLLECTION_NAME)
    }

    async fn fetch_questions(&self) -> MongoResult<Vec<QuestionEntity>> {
        let documents: Vec<MongoQuestionDocument> = self
            .question_collection()
            .await
            .find(doc! {})
            .await
            .map_err(|source| MongoDaoError::LoadQuestions { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadQuestions { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn save_question(&self, question: QuestionEntity) -> MongoResult<()> {
        let id = question.id.clone();
        let document = MongoQuestionDocument::from(question);
        self.question_collection()
            .await
            .replace_one(doc_id(&id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveQuestion { id, source })?;
        Ok(())
    }

    async fn submit_entry(&self, entry: NewLeaderboardEntry) -> MongoResult<LeaderboardEntryEntity> {
        let stored = entry.with_id(Uuid::new_v4());
        self.entry_collection()
            .await
            .insert_one(MongoEntryDocument::from(&stored))
            .await
            .map_err(|source| MongoDaoError::InsertEntry {
                id: stored.id,
                source,
            })?;
        Ok(stored)
    }

    async fn fetch_ranked(&self, limit: usize) -> MongoResult<Vec<LeaderboardEntryEntity>> {
        let documents: Vec<MongoEntryDocument> = self
            .entry_collection()
            .await
            .find(doc! {})
            .sort(ranking_order())
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await
            .map_err(|source| MongoDaoError::LoadRanked { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadRanked { source })?;

        documents
            .into_iter()
            .map(LeaderboardEntryEntity::try_from)
            .collect()
    }
}

impl QuizStore for MongoQuizStore {
    fn fetch_questions(&self) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.fetch_questions().await.map_err(Into::into) })
    }

    fn save_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_question(question).await.map_err(Into::into) })
    }

    fn submit_entry(
        &self,
        entry: NewLeaderboardEntry,
    ) -> BoxFuture<'static, StorageResult<LeaderboardEntryEntity>> {
        let store = self.clone();
        Box::pin(async move { store.submit_entry(entry).await.map_err(Into::into) })
    }

    fn fetch_ranked(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntryEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.fetch_ranked(limit).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
