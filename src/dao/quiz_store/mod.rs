#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::{cmp::Reverse, sync::Arc};

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::dao::models::{LeaderboardEntryEntity, NewLeaderboardEntry, QuestionEntity};
use crate::dao::storage::{StorageError, StorageResult};

/// Abstraction over the remote store holding the question pool and the ranked list.
///
/// The ranked list is append-only from the engine's point of view: there is no
/// update or delete path.
pub trait QuizStore: Send + Sync {
    /// Return the whole (unordered) question pool.
    fn fetch_questions(&self) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>>;
    /// Upsert a question into the pool, keyed by its identifier.
    fn save_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Append a leaderboard entry, returning it with its assigned identifier.
    fn submit_entry(
        &self,
        entry: NewLeaderboardEntry,
    ) -> BoxFuture<'static, StorageResult<LeaderboardEntryEntity>>;
    /// Return at most `limit` entries ordered by [`rank_entries`] rules.
    fn fetch_ranked(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntryEntity>>>;
    /// Check that the backend answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Order entries by descending score, then ascending timestamp, and keep the top `limit`.
///
/// The record identifier breaks exact ties so the order is deterministic.
pub fn rank_entries(
    mut entries: Vec<LeaderboardEntryEntity>,
    limit: usize,
) -> Vec<LeaderboardEntryEntity> {
    entries.sort_by_key(|entry| (Reverse(entry.score), entry.timestamp_ms, entry.id));
    entries.truncate(limit);
    entries
}

/// Swappable slot holding the currently installed backend.
///
/// An empty slot means the application runs in degraded mode.
#[derive(Default)]
pub struct StoreSlot {
    store: RwLock<Option<Arc<dyn QuizStore>>>,
}

impl StoreSlot {
    /// Build an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a slot already holding `store`.
    pub fn with_store(store: Arc<dyn QuizStore>) -> Self {
        Self {
            store: RwLock::new(Some(store)),
        }
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn get(&self) -> Option<Arc<dyn QuizStore>> {
        self.store.read().await.as_ref().cloned()
    }

    /// Obtain the current store or fail with [`StorageError::Missing`].
    pub async fn require(&self) -> StorageResult<Arc<dyn QuizStore>> {
        self.get().await.ok_or(StorageError::Missing)
    }

    /// Replace the current store.
    pub async fn install(&self, store: Arc<dyn QuizStore>) {
        let mut guard = self.store.write().await;
        *guard = Some(store);
    }

    /// Remove the current store.
    pub async fn clear(&self) {
        let mut guard = self.store.write().await;
        guard.take();
    }

    /// Whether a store is installed.
    pub async fn is_installed(&self) -> bool {
        self.store.read().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn entry(name: &str, score: u32, timestamp_ms: u64) -> LeaderboardEntryEntity {
        LeaderboardEntryEntity {
            id: Uuid::new_v4(),
            display_name: name.into(),
            score,
            timestamp_ms,
        }
    }

    fn names(entries: &[LeaderboardEntryEntity]) -> Vec<&str> {
        entries.iter().map(|e| e.display_name.as_str()).collect()
    }

    #[test]
    fn ties_on_score_rank_earlier_submission_first() {
        let ranked = rank_entries(
            vec![entry("A", 50, 1), entry("B", 70, 2), entry("C", 70, 1)],
            20,
        );
        assert_eq!(names(&ranked), ["C", "B", "A"]);
    }

    #[test]
    fn ranking_is_bounded_by_limit() {
        let entries = (0..30).map(|i| entry("p", i, 100)).collect();
        let ranked = rank_entries(entries, 20);
        assert_eq!(ranked.len(), 20);
        assert_eq!(ranked[0].score, 29);
        assert_eq!(ranked[19].score, 10);
    }

    #[test]
    fn blank_names_are_kept() {
        let ranked = rank_entries(vec![entry("", 3, 1)], 20);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].display_name, "");
    }

    #[tokio::test]
    async fn empty_slot_reports_missing_store() {
        let slot = StoreSlot::new();
        assert!(!slot.is_installed().await);
        assert!(matches!(slot.require().await, Err(StorageError::Missing)));
    }
}
