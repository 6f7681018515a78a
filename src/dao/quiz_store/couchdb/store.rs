use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use uuid::Uuid;

use crate::dao::{
    models::{LeaderboardEntryEntity, NewLeaderboardEntry, QuestionEntity},
    quiz_store::{QuizStore, rank_entries},
    storage::StorageResult,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, ENTRY_RANGE, EntryDocument, KeyRange, QUESTION_RANGE, QuestionDocument,
        question_doc_id,
    },
};

/// [`QuizStore`] backed by a single CouchDB database.
#[derive(Clone)]
pub struct CouchQuizStore {
    client: Client,
    config: Arc<CouchConfig>,
}

impl CouchQuizStore {
    /// Build the client and create the database when it does not exist yet.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder().build().map_err(CouchDaoError::Client)?;
        let store = Self {
            client,
            config: Arc::new(config),
        };
        store.ensure_database().await?;
        Ok(store)
    }

    fn request(&self, method: Method, path: Option<&str>) -> RequestBuilder {
        let url = match path {
            Some(path) => format!("{}/{path}", self.config.database_url()),
            None => self.config.database_url(),
        };
        let builder = self.client.request(method, url);
        match &self.config.credentials {
            Some(credentials) => {
                builder.basic_auth(&credentials.username, Some(&credentials.password))
            }
            None => builder,
        }
    }

    /// Send `builder`, accepting success statuses plus any listed in `tolerated`.
    async fn send(
        operation: &'static str,
        builder: RequestBuilder,
        tolerated: &[StatusCode],
    ) -> CouchResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|source| CouchDaoError::Transport { operation, source })?;
        let status = response.status();
        if status.is_success() || tolerated.contains(&status) {
            Ok(response)
        } else {
            Err(CouchDaoError::Status { operation, status })
        }
    }

    async fn decode<T: DeserializeOwned>(
        operation: &'static str,
        response: Response,
    ) -> CouchResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|source| CouchDaoError::Decode { operation, source })
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let existing = Self::send(
            "database lookup",
            self.request(Method::HEAD, None),
            &[StatusCode::NOT_FOUND],
        )
        .await?;
        if existing.status() != StatusCode::NOT_FOUND {
            return Ok(());
        }

        // 412 means another instance created it first.
        Self::send(
            "database create",
            self.request(Method::PUT, None),
            &[StatusCode::PRECONDITION_FAILED],
        )
        .await?;
        info!(database = %self.config.database, "created CouchDB database");
        Ok(())
    }

    async fn current_rev(&self, doc_id: &str) -> CouchResult<Option<String>> {
        let response = Self::send(
            "revision lookup",
            self.request(Method::HEAD, Some(doc_id)),
            &[StatusCode::NOT_FOUND],
        )
        .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|value| value.to_str().ok())
            .map(|etag| etag.trim_matches('"').to_owned()))
    }

    /// Read the documents whose ids fall in `range`, in id order.
    async fn scan<T: DeserializeOwned>(
        &self,
        range: KeyRange,
        limit: Option<usize>,
    ) -> CouchResult<Vec<T>> {
        let (start, end) = range.bounds();
        let mut query = vec![
            ("include_docs", "true".to_owned()),
            ("startkey", start),
            ("endkey", end),
        ];
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }

        let response = Self::send(
            "document scan",
            self.request(Method::GET, Some("_all_docs")).query(&query),
            &[],
        )
        .await?;
        let page: AllDocsResponse = Self::decode("document scan", response).await?;
        debug!(prefix = range.0, rows = page.rows.len(), "scanned CouchDB range");

        page.rows
            .into_iter()
            .filter_map(|row| row.doc.map(|doc| (row.id, doc)))
            .map(|(doc_id, doc)| {
                serde_json::from_value(doc)
                    .map_err(|source| CouchDaoError::Document { doc_id, source })
            })
            .collect()
    }
}

impl QuizStore for CouchQuizStore {
    fn fetch_questions(&self) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs: Vec<QuestionDocument> = store.scan(QUESTION_RANGE, None).await?;
            let questions = docs
                .into_iter()
                .map(QuestionEntity::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(questions)
        })
    }

    fn save_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = question_doc_id(&question.id);
            let rev = store.current_rev(&doc_id).await?;
            let doc = QuestionDocument::new(question, rev);
            Self::send(
                "question write",
                store.request(Method::PUT, Some(doc_id.as_str())).json(&doc),
                &[],
            )
            .await?;
            Ok(())
        })
    }

    fn submit_entry(
        &self,
        entry: NewLeaderboardEntry,
    ) -> BoxFuture<'static, StorageResult<LeaderboardEntryEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let stored = entry.with_id(Uuid::new_v4());
            let doc = EntryDocument::from(&stored);
            Self::send(
                "entry write",
                store.request(Method::PUT, Some(doc.id.as_str())).json(&doc),
                &[],
            )
            .await?;
            Ok(stored)
        })
    }

    fn fetch_ranked(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntryEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs: Vec<EntryDocument> = store.scan(ENTRY_RANGE, Some(limit)).await?;
            let entries = docs
                .into_iter()
                .map(LeaderboardEntryEntity::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rank_entries(entries, limit))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            Self::send("health check", store.request(Method::GET, None), &[]).await?;
            Ok(())
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.ensure_database().await?) })
    }
}
