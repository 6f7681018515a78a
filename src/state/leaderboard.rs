//! Ranked list runtime types and the read path used by the rendering layer.

use std::sync::atomic::{AtomicU64, Ordering};

use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::dao::{models::LeaderboardEntryEntity, quiz_store::StoreSlot};

/// Name shown for entries submitted with a blank display name.
pub const ANONYMOUS: &str = "Anonymous";

/// Ranked entry as seen by the engine and the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    /// Identifier assigned by the store.
    pub id: Uuid,
    /// Name exactly as submitted; may be blank.
    pub display_name: String,
    /// Final session score.
    pub score: u32,
    /// Submission time in milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl LeaderboardEntry {
    /// Name to render, substituting [`ANONYMOUS`] for a blank one.
    pub fn shown_name(&self) -> &str {
        if self.display_name.trim().is_empty() {
            ANONYMOUS
        } else {
            &self.display_name
        }
    }
}

impl From<LeaderboardEntryEntity> for LeaderboardEntry {
    fn from(value: LeaderboardEntryEntity) -> Self {
        Self {
            id: value.id,
            display_name: value.display_name,
            score: value.score,
            timestamp_ms: value.timestamp_ms,
        }
    }
}

/// Result of a ranked read. Never an error: failures leave `entries` empty
/// and describe themselves in `error`.
#[derive(Debug, Clone, Default)]
pub struct LeaderboardView {
    /// Top entries, best first.
    pub entries: Vec<LeaderboardEntry>,
    /// Why the read failed, if it did.
    pub error: Option<String>,
}

/// Read the top `limit` entries from whichever store is installed.
pub async fn fetch_top(slot: &StoreSlot, limit: usize) -> LeaderboardView {
    let result = match slot.require().await {
        Ok(store) => store.fetch_ranked(limit).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(entries) => LeaderboardView {
            entries: entries.into_iter().map(Into::into).collect(),
            error: None,
        },
        Err(err) => {
            warn!(error = %err, limit, "failed to read leaderboard");
            LeaderboardView {
                entries: Vec::new(),
                error: Some(err.to_string()),
            }
        }
    }
}

/// Wall-clock source for submission timestamps that never repeats or goes back.
#[derive(Debug, Default)]
pub struct SubmissionClock {
    last: AtomicU64,
}

impl SubmissionClock {
    /// Build a clock that has issued nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamp for a submission happening now.
    pub fn next(&self) -> u64 {
        self.next_after(now_ms())
    }

    /// Timestamp for a submission observed at `now_ms`: `max(now_ms, last + 1)`.
    pub fn next_after(&self, now_ms: u64) -> u64 {
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now_ms.max(current.saturating_add(1));
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => current = actual,
            }
        }
    }
}

fn now_ms() -> u64 {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    u64::try_from(millis).unwrap_or_default()
}
