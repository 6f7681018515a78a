use mongodb::bson::{Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{LeaderboardEntryEntity, QuestionEntity};

use super::error::MongoDaoError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuestionDocument {
    #[serde(rename = "_id")]
    id: String,
    text: String,
    options: Vec<String>,
    correct_option_index: i64,
}

impl From<QuestionEntity> for MongoQuestionDocument {
    fn from(value: QuestionEntity) -> Self {
        Self {
            id: value.id,
            text: value.text,
            options: value.options,
            correct_option_index: i64::try_from(value.correct_option_index).unwrap_or(i64::MAX),
        }
    }
}

impl From<MongoQuestionDocument> for QuestionEntity {
    fn from(value: MongoQuestionDocument) -> Self {
        // Negative indices are clamped out of range so session building drops the record.
        Self {
            id: value.id,
            text: value.text,
            correct_option_index: usize::try_from(value.correct_option_index)
                .unwrap_or(usize::MAX),
            options: value.options,
        }
    }
}

/// Leaderboard entry as stored: identifiers as strings, counters as signed BSON integers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoEntryDocument {
    #[serde(rename = "_id")]
    id: String,
    display_name: String,
    score: i64,
    timestamp_ms: i64,
}

impl From<&LeaderboardEntryEntity> for MongoEntryDocument {
    fn from(value: &LeaderboardEntryEntity) -> Self {
        Self {
            id: value.id.to_string(),
            display_name: value.display_name.clone(),
            score: i64::from(value.score),
            timestamp_ms: i64::try_from(value.timestamp_ms).unwrap_or(i64::MAX),
        }
    }
}

impl TryFrom<MongoEntryDocument> for LeaderboardEntryEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoEntryDocument) -> Result<Self, Self::Error> {
        let malformed = |reason| MongoDaoError::MalformedEntry {
            id: value.id.clone(),
            reason,
        };

        Ok(Self {
            id: Uuid::parse_str(&value.id).map_err(|_| malformed("invalid UUID"))?,
            score: u32::try_from(value.score).map_err(|_| malformed("score out of range"))?,
            timestamp_ms: u64::try_from(value.timestamp_ms)
                .map_err(|_| malformed("negative timestamp"))?,
            display_name: value.display_name,
        })
    }
}

pub fn doc_id(id: &str) -> Document {
    doc! {"_id": id}
}

/// Sort document shared by the ranking query and its index.
pub fn ranking_order() -> Document {
    doc! {"score": -1, "timestamp_ms": 1}
}
