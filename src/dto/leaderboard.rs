use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::format_timestamp_ms,
    state::leaderboard::{LeaderboardEntry, LeaderboardView},
};

/// Query accepted by `GET /leaderboard`.
#[derive(Debug, Default, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardQuery {
    /// Number of entries to return (1-100, defaults to the configured limit).
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<usize>,
}

/// Public projection of a ranked entry.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaderboardEntryDto {
    /// One-based position; absent outside of a ranked listing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<usize>,
    pub id: Uuid,
    /// Name to display ("Anonymous" when submitted blank).
    pub display_name: String,
    pub score: u32,
    pub timestamp_ms: u64,
    /// RFC 3339 rendering of `timestamp_ms`.
    pub submitted_at: String,
}

impl From<&LeaderboardEntry> for LeaderboardEntryDto {
    fn from(entry: &LeaderboardEntry) -> Self {
        Self {
            rank: None,
            id: entry.id,
            display_name: entry.shown_name().to_string(),
            score: entry.score,
            timestamp_ms: entry.timestamp_ms,
            submitted_at: format_timestamp_ms(entry.timestamp_ms),
        }
    }
}

/// Ranked listing. `error` is set, and `entries` empty, when the read failed.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntryDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<LeaderboardView> for LeaderboardResponse {
    fn from(view: LeaderboardView) -> Self {
        let entries = view
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| LeaderboardEntryDto {
                rank: Some(position + 1),
                ..entry.into()
            })
            .collect();

        Self {
            entries,
            error: view.error,
        }
    }
}
