//! Document layout.
//!
//! Entry identifiers embed the inverted score and the timestamp as fixed-width
//! decimals, so `_all_docs` over the entry range already yields leaderboard
//! order and a `limit` bounds the read on the server.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::dao::{
    models::{LeaderboardEntryEntity, QuestionEntity},
    quiz_store::couchdb::error::CouchDaoError,
};

pub const QUESTION_RANGE: KeyRange = KeyRange("question:");
pub const ENTRY_RANGE: KeyRange = KeyRange("entry:");

/// Document id prefix selecting one kind of record.
#[derive(Debug, Clone, Copy)]
pub struct KeyRange(pub &'static str);

impl KeyRange {
    /// JSON-encoded `startkey` / `endkey` pair covering every id with this prefix.
    pub fn bounds(self) -> (String, String) {
        let start = Value::from(self.0).to_string();
        let end = Value::from(format!("{}\u{fff0}", self.0)).to_string();
        (start, end)
    }
}

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub text: String,
    pub options: Vec<String>,
    pub correct_option_index: usize,
}

impl QuestionDocument {
    pub fn new(question: QuestionEntity, rev: Option<String>) -> Self {
        Self {
            id: question_doc_id(&question.id),
            rev,
            text: question.text,
            options: question.options,
            correct_option_index: question.correct_option_index,
        }
    }
}

impl TryFrom<QuestionDocument> for QuestionEntity {
    type Error = CouchDaoError;

    fn try_from(doc: QuestionDocument) -> Result<Self, Self::Error> {
        let id = match doc.id.strip_prefix(QUESTION_RANGE.0) {
            Some(id) if !id.is_empty() => id.to_owned(),
            _ => {
                return Err(CouchDaoError::InvalidDocId {
                    doc_id: doc.id,
                    kind: "not a question id",
                });
            }
        };

        Ok(Self {
            id,
            text: doc.text,
            options: doc.options,
            correct_option_index: doc.correct_option_index,
        })
    }
}

/// Immutable leaderboard record; written once, never revised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub display_name: String,
    pub score: u32,
    pub timestamp_ms: u64,
}

impl From<&LeaderboardEntryEntity> for EntryDocument {
    fn from(entry: &LeaderboardEntryEntity) -> Self {
        Self {
            id: entry_doc_id(entry),
            display_name: entry.display_name.clone(),
            score: entry.score,
            timestamp_ms: entry.timestamp_ms,
        }
    }
}

impl TryFrom<EntryDocument> for LeaderboardEntryEntity {
    type Error = CouchDaoError;

    fn try_from(doc: EntryDocument) -> Result<Self, Self::Error> {
        let id = doc
            .id
            .rsplit(':')
            .next()
            .and_then(|tail| Uuid::parse_str(tail).ok())
            .ok_or_else(|| CouchDaoError::InvalidDocId {
                doc_id: doc.id.clone(),
                kind: "missing entry UUID",
            })?;

        Ok(Self {
            id,
            display_name: doc.display_name,
            score: doc.score,
            timestamp_ms: doc.timestamp_ms,
        })
    }
}

pub fn question_doc_id(id: &str) -> String {
    format!("{}{id}", QUESTION_RANGE.0)
}

/// `entry:<u32::MAX - score>:<timestamp>:<uuid>`, zero padded.
pub fn entry_doc_id(entry: &LeaderboardEntryEntity) -> String {
    format!(
        "{}{:010}:{:020}:{}",
        ENTRY_RANGE.0,
        u32::MAX - entry.score,
        entry.timestamp_ms,
        entry.id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(score: u32, timestamp_ms: u64) -> LeaderboardEntryEntity {
        LeaderboardEntryEntity {
            id: Uuid::new_v4(),
            display_name: String::new(),
            score,
            timestamp_ms,
        }
    }

    #[test]
    fn entry_ids_sort_in_ranking_order() {
        let a = entry(50, 1);
        let b = entry(70, 2);
        let c = entry(70, 1);
        let mut ids = [&a, &b, &c].map(entry_doc_id);
        ids.sort();
        assert_eq!(ids, [entry_doc_id(&c), entry_doc_id(&b), entry_doc_id(&a)]);
    }

    #[test]
    fn entry_document_keeps_its_uuid() {
        let stored = entry(3, 42);
        let doc = EntryDocument::from(&stored);
        assert_eq!(LeaderboardEntryEntity::try_from(doc).unwrap(), stored);
    }

    #[test]
    fn question_document_strips_prefix() {
        let question = QuestionEntity {
            id: "q1".into(),
            text: "What is a coroutine?".into(),
            options: vec!["A thread".into(), "A light-weight thread".into()],
            correct_option_index: 1,
        };
        let doc = QuestionDocument::new(question.clone(), None);
        assert_eq!(doc.id, "question:q1");
        assert_eq!(QuestionEntity::try_from(doc).unwrap(), question);
    }

    #[test]
    fn foreign_document_id_is_rejected() {
        let doc = EntryDocument {
            id: "entry:not-a-uuid".into(),
            display_name: "A".into(),
            score: 1,
            timestamp_ms: 1,
        };
        assert!(matches!(
            LeaderboardEntryEntity::try_from(doc),
            Err(CouchDaoError::InvalidDocId { .. })
        ));
    }
}
