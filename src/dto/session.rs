//! Payloads exposing the quiz session to the rendering layer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::validation::validate_display_name,
    state::{
        session::{Question, Selection, SessionSnapshot},
        state_machine::{QuestionPhase, SessionPhase},
    },
};

/// Flattened session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhaseDto {
    Idle,
    Loading,
    Failed,
    Answering,
    Locked,
    Resolved,
    Finished,
}

impl From<SessionPhase> for SessionPhaseDto {
    fn from(value: SessionPhase) -> Self {
        match value {
            SessionPhase::Idle => Self::Idle,
            SessionPhase::Loading => Self::Loading,
            SessionPhase::Failed => Self::Failed,
            SessionPhase::InQuestion(QuestionPhase::Answering) => Self::Answering,
            SessionPhase::InQuestion(QuestionPhase::Locked) => Self::Locked,
            SessionPhase::InQuestion(QuestionPhase::Resolved) => Self::Resolved,
            SessionPhase::Finished => Self::Finished,
        }
    }
}

/// Answer state of the current question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectionDto {
    Unanswered,
    Chosen { index: usize },
    TimedOut,
}

impl From<Selection> for SelectionDto {
    fn from(value: Selection) -> Self {
        match value {
            Selection::Unanswered => Self::Unanswered,
            Selection::Chosen(index) => Self::Chosen { index },
            Selection::TimedOut => Self::TimedOut,
        }
    }
}

/// Question as shown to the player.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionView {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    /// Only present once the question has been resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_option_index: Option<usize>,
}

impl QuestionView {
    fn new(question: &Question, revealed: bool) -> Self {
        Self {
            id: question.id.clone(),
            text: question.text.clone(),
            options: question.options.clone(),
            correct_option_index: revealed.then_some(question.correct_option_index),
        }
    }
}

/// Read-only projection of the session state.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub phase: SessionPhaseDto,
    pub version: usize,
    pub question_count: usize,
    pub current_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<QuestionView>,
    pub selection: SelectionDto,
    pub score: u32,
    pub time_left_secs: u32,
    pub finished: bool,
    pub submitted: bool,
    pub loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&SessionSnapshot> for SessionResponse {
    fn from(snapshot: &SessionSnapshot) -> Self {
        let revealed = snapshot.is_revealed();
        Self {
            session_id: snapshot.session_id,
            phase: snapshot.phase.into(),
            version: snapshot.version,
            question_count: snapshot.question_count(),
            current_index: snapshot.current_index,
            question: snapshot
                .current_question()
                .map(|question| QuestionView::new(question, revealed)),
            selection: snapshot.selection.into(),
            score: snapshot.score,
            time_left_secs: snapshot.time_left_secs,
            finished: snapshot.finished,
            submitted: snapshot.submitted,
            loading: snapshot.loading,
            error: snapshot.error.clone(),
        }
    }
}

/// Answer chosen for the current question.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AnswerRequest {
    /// Zero-based option index.
    pub index: usize,
}

/// Result submission for a finished session.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitScoreRequest {
    /// Free-text display name, at most 64 characters. Blank is accepted and shown as "Anonymous".
    #[serde(default)]
    #[validate(length(max = 64), custom(function = "validate_display_name"))]
    pub name: String,
}
