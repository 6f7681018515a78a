use thiserror::Error;

/// High-level phases of one quiz session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Engine created, nothing requested yet.
    Idle,
    /// Question pool is being fetched.
    Loading,
    /// Fetch failed; the session offers no further action besides "play again".
    Failed,
    /// A question is in flight, in one of its sub-phases.
    InQuestion(QuestionPhase),
    /// Every question has been resolved. Terminal for this session instance.
    Finished,
}

/// Fine-grained phase while a question is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionPhase {
    /// Countdown running, waiting for an answer.
    Answering,
    /// Answer locked in, waiting for the reveal delay before scoring.
    Locked,
    /// Answer scored and shown, waiting for the display delay before advancing.
    Resolved,
}

impl SessionPhase {
    /// Whether the current question has already been scored.
    pub fn is_resolved(self) -> bool {
        matches!(self, SessionPhase::InQuestion(QuestionPhase::Resolved))
    }
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Start fetching the question pool.
    Start,
    /// Pool fetched and non-empty; the first question begins.
    QuestionsLoaded,
    /// Fetch failed or produced nothing playable.
    LoadFailed,
    /// The player picked an option.
    AnswerLocked,
    /// The countdown reached zero with no answer.
    TimedOut,
    /// The reveal delay elapsed and the locked answer was scored.
    Resolve,
    /// The display delay elapsed and another question follows.
    NextQuestion,
    /// The display delay elapsed after the last question.
    Finish,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: SessionPhase,
    /// The event that cannot be applied from this phase.
    pub event: SessionEvent,
}

/// State machine implementing the session flow
/// `Idle → Loading → InQuestion(Answering → [Locked →] Resolved) → … → Finished`.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    phase: SessionPhase,
    version: usize,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
            version: 0,
        }
    }
}

impl SessionStateMachine {
    /// Create a new state machine initialised in the idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Number of transitions applied so far.
    pub fn version(&self) -> usize {
        self.version
    }

    /// Check whether `event` would be accepted without applying it.
    pub fn can_apply(&self, event: SessionEvent) -> bool {
        self.compute_transition(event).is_ok()
    }

    /// Apply `event`, returning the new phase.
    pub fn apply(&mut self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        self.version += 1;
        Ok(next)
    }

    fn compute_transition(&self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        use QuestionPhase::*;
        use SessionEvent as E;
        use SessionPhase as P;

        let next = match (self.phase, event) {
            (P::Idle, E::Start) => P::Loading,
            (P::Loading, E::QuestionsLoaded) => P::InQuestion(Answering),
            (P::Loading, E::LoadFailed) => P::Failed,
            (P::InQuestion(Answering), E::AnswerLocked) => P::InQuestion(Locked),
            (P::InQuestion(Answering), E::TimedOut) => P::InQuestion(Resolved),
            (P::InQuestion(Locked), E::Resolve) => P::InQuestion(Resolved),
            (P::InQuestion(Resolved), E::NextQuestion) => P::InQuestion(Answering),
            (P::InQuestion(Resolved), E::Finish) => P::Finished,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
