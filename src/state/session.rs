//! Session data: validated questions, the per-question selection and the
//! observable session snapshot.

use std::sync::Arc;

use indexmap::IndexMap;
use rand::{Rng, seq::SliceRandom};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::{dao::models::QuestionEntity, state::state_machine::SessionPhase};

/// Immutable question used during a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Identifier, unique within the session.
    pub id: String,
    /// Prompt text.
    pub text: String,
    /// Answer options in display order (at least two).
    pub options: Vec<String>,
    /// Index of the correct option, always valid for `options`.
    pub correct_option_index: usize,
}

/// Reasons a stored question record cannot be played.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidQuestion {
    /// Fewer than two options.
    #[error("question `{id}` has {count} option(s); at least 2 are required")]
    TooFewOptions { id: String, count: usize },
    /// Correct index does not point into the option list.
    #[error("question `{id}` marks option {index} correct but only has {count} option(s)")]
    CorrectIndexOutOfRange { id: String, index: usize, count: usize },
}

impl TryFrom<QuestionEntity> for Question {
    type Error = InvalidQuestion;

    fn try_from(value: QuestionEntity) -> Result<Self, Self::Error> {
        let count = value.options.len();
        if count < 2 {
            return Err(InvalidQuestion::TooFewOptions {
                id: value.id,
                count,
            });
        }
        if value.correct_option_index >= count {
            return Err(InvalidQuestion::CorrectIndexOutOfRange {
                id: value.id,
                index: value.correct_option_index,
                count,
            });
        }

        Ok(Self {
            id: value.id,
            text: value.text,
            options: value.options,
            correct_option_index: value.correct_option_index,
        })
    }
}

impl From<Question> for QuestionEntity {
    fn from(value: Question) -> Self {
        Self {
            id: value.id,
            text: value.text,
            options: value.options,
            correct_option_index: value.correct_option_index,
        }
    }
}

/// Answer state of the question in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Selection {
    /// Nothing chosen yet.
    #[default]
    Unanswered,
    /// The player picked this option index.
    Chosen(usize),
    /// The countdown reached zero first. Never equal to any option index.
    TimedOut,
}

impl Selection {
    /// Whether the question still accepts an answer.
    pub fn is_pending(self) -> bool {
        matches!(self, Selection::Unanswered)
    }
}

/// Build the playable question list for one session.
///
/// Invalid records and duplicate identifiers are dropped with a warning, the
/// survivors are shuffled, and the list is cut to `limit` when one is given.
pub fn prepare_questions<R: Rng + ?Sized>(
    pool: Vec<QuestionEntity>,
    limit: Option<usize>,
    rng: &mut R,
) -> Vec<Question> {
    let mut unique: IndexMap<String, Question> = IndexMap::with_capacity(pool.len());
    for entity in pool {
        match Question::try_from(entity) {
            Ok(question) => {
                if unique.contains_key(&question.id) {
                    warn!(id = %question.id, "duplicate question identifier; keeping the first");
                    continue;
                }
                unique.insert(question.id.clone(), question);
            }
            Err(err) => warn!(error = %err, "skipping unplayable question"),
        }
    }

    let mut questions: Vec<Question> = unique.into_values().collect();
    questions.shuffle(rng);
    if let Some(limit) = limit {
        questions.truncate(limit);
    }
    questions
}

/// Read-only view of the session published after every transition.
///
/// Observers receive clones; only the engine actor produces new values.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Identifier of this session instance; changes on "play again".
    pub session_id: Uuid,
    /// Current state-machine phase.
    pub phase: SessionPhase,
    /// Number of transitions applied so far.
    pub version: usize,
    /// Ordered questions for the session (shared, never mutated).
    pub questions: Arc<[Question]>,
    /// Index of the current question; equals the question count once finished.
    pub current_index: usize,
    /// Accumulated score.
    pub score: u32,
    /// Seconds left on the current question's countdown.
    pub time_left_secs: u32,
    /// Selection for the current question.
    pub selection: Selection,
    /// Whether every question has been resolved.
    pub finished: bool,
    /// Whether the result has been written to the leaderboard.
    pub submitted: bool,
    /// Whether the question pool is being fetched.
    pub loading: bool,
    /// Description of the last load failure, if any.
    pub error: Option<String>,
}

impl SessionSnapshot {
    /// Snapshot of a session that has not been started yet.
    pub fn idle(session_id: Uuid) -> Self {
        Self {
            session_id,
            phase: SessionPhase::Idle,
            version: 0,
            questions: Arc::from(Vec::new()),
            current_index: 0,
            score: 0,
            time_left_secs: 0,
            selection: Selection::Unanswered,
            finished: false,
            submitted: false,
            loading: false,
            error: None,
        }
    }

    /// Question currently in flight, if any.
    pub fn current_question(&self) -> Option<&Question> {
        if self.finished {
            return None;
        }
        self.questions.get(self.current_index)
    }

    /// Total number of questions in the session.
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Whether the current question has been scored and its answer may be shown.
    pub fn is_revealed(&self) -> bool {
        self.phase.is_resolved()
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn entity(id: &str, options: usize, correct: usize) -> QuestionEntity {
        QuestionEntity {
            id: id.into(),
            text: format!("prompt {id}"),
            options: (0..options).map(|i| format!("option {i}")).collect(),
            correct_option_index: correct,
        }
    }

    #[test]
    fn question_requires_two_options() {
        let err = Question::try_from(entity("q1", 1, 0)).unwrap_err();
        assert_eq!(
            err,
            InvalidQuestion::TooFewOptions {
                id: "q1".into(),
                count: 1
            }
        );
    }

    #[test]
    fn question_requires_valid_correct_index() {
        let err = Question::try_from(entity("q1", 4, 4)).unwrap_err();
        assert!(matches!(err, InvalidQuestion::CorrectIndexOutOfRange { index: 4, .. }));
    }

    #[test]
    fn prepare_drops_invalid_and_duplicate_questions() {
        let mut rng = StdRng::seed_from_u64(7);
        let pool = vec![
            entity("q1", 4, 1),
            entity("q1", 4, 2),
            entity("q2", 1, 0),
            entity("q3", 2, 5),
            entity("q4", 3, 0),
        ];

        let mut ids: Vec<_> = prepare_questions(pool, None, &mut rng)
            .into_iter()
            .map(|q| q.id)
            .collect();
        ids.sort();
        assert_eq!(ids, ["q1", "q4"]);
    }

    #[test]
    fn prepare_respects_session_limit() {
        let mut rng = StdRng::seed_from_u64(7);
        let pool = (0..10).map(|i| entity(&format!("q{i}"), 2, 0)).collect();
        assert_eq!(prepare_questions(pool, Some(3), &mut rng).len(), 3);
    }

    #[test]
    fn selection_pending_only_when_unanswered() {
        assert!(Selection::Unanswered.is_pending());
        assert!(!Selection::Chosen(0).is_pending());
        assert!(!Selection::TimedOut.is_pending());
    }

    #[test]
    fn finished_snapshot_has_no_current_question() {
        let mut snapshot = SessionSnapshot::idle(Uuid::new_v4());
        snapshot.questions = Arc::from(vec![Question::try_from(entity("q1", 2, 0)).unwrap()]);
        assert!(snapshot.current_question().is_some());

        snapshot.current_index = 1;
        snapshot.finished = true;
        assert!(snapshot.current_question().is_none());
    }
}
