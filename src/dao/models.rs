use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Question record as stored in the question pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Identifier, unique within the pool.
    pub id: String,
    /// Prompt displayed to the player.
    pub text: String,
    /// Answer options in display order.
    pub options: Vec<String>,
    /// Index of the correct option (0-based).
    pub correct_option_index: usize,
}

/// Score record appended to the ranked list once a session is submitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntryEntity {
    /// Record identifier assigned when the entry is stored.
    pub id: Uuid,
    /// Free-text name supplied by the player, kept verbatim (may be blank).
    pub display_name: String,
    /// Final session score.
    pub score: u32,
    /// Submission time in milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

/// Entry payload handed to a store before it has been assigned an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLeaderboardEntry {
    /// Free-text name supplied by the player.
    pub display_name: String,
    /// Final session score.
    pub score: u32,
    /// Submission time in milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl NewLeaderboardEntry {
    /// Attach a freshly generated record identifier.
    pub fn with_id(self, id: Uuid) -> LeaderboardEntryEntity {
        LeaderboardEntryEntity {
            id,
            display_name: self.display_name,
            score: self.score,
            timestamp_ms: self.timestamp_ms,
        }
    }
}
