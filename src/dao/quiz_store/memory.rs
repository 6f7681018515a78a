//! Process-local store used when no remote backend is configured and in tests.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{LeaderboardEntryEntity, NewLeaderboardEntry, QuestionEntity},
    quiz_store::{QuizStore, rank_entries},
    storage::StorageResult,
};

/// In-memory implementation of [`QuizStore`] backed by concurrent maps.
#[derive(Clone, Default)]
pub struct MemoryQuizStore {
    questions: Arc<DashMap<String, QuestionEntity>>,
    entries: Arc<DashMap<Uuid, LeaderboardEntryEntity>>,
}

impl MemoryQuizStore {
    /// Build an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `questions`.
    pub fn with_questions(questions: impl IntoIterator<Item = QuestionEntity>) -> Self {
        let store = Self::new();
        for question in questions {
            store.questions.insert(question.id.clone(), question);
        }
        store
    }

    /// Insert an already identified entry, bypassing the submission path.
    pub fn insert_entry(&self, entry: LeaderboardEntryEntity) {
        self.entries.insert(entry.id, entry);
    }

    /// Number of leaderboard entries currently held.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

impl QuizStore for MemoryQuizStore {
    fn fetch_questions(&self) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let questions = self
            .questions
            .iter()
            .map(|item| item.value().clone())
            .collect();
        Box::pin(async move { Ok(questions) })
    }

    fn save_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.questions.insert(question.id.clone(), question);
        Box::pin(async { Ok(()) })
    }

    fn submit_entry(
        &self,
        entry: NewLeaderboardEntry,
    ) -> BoxFuture<'static, StorageResult<LeaderboardEntryEntity>> {
        let stored = entry.with_id(Uuid::new_v4());
        self.entries.insert(stored.id, stored.clone());
        Box::pin(async move { Ok(stored) })
    }

    fn fetch_ranked(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntryEntity>>> {
        let entries = self
            .entries
            .iter()
            .map(|item| item.value().clone())
            .collect();
        Box::pin(async move { Ok(rank_entries(entries, limit)) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
