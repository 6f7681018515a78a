//! Single-writer quiz session engine.
//!
//! [`QuizEngine`] is a cheap handle onto an actor task that owns the session.
//! Every mutation (external calls, timer ticks, alarms and I/O completions)
//! arrives as a [`Command`] on one channel and is applied in order, so no two
//! transitions ever run concurrently. Observers read [`SessionSnapshot`]s
//! through a `watch` channel that only the actor writes.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::QuizSettings,
    dao::{
        models::{LeaderboardEntryEntity, NewLeaderboardEntry, QuestionEntity},
        quiz_store::StoreSlot,
        storage::StorageResult,
    },
    state::{
        leaderboard::{LeaderboardEntry, SubmissionClock},
        scoring::score_delta,
        session::{Question, SessionSnapshot, Selection, prepare_questions},
        state_machine::{InvalidTransition, SessionEvent, SessionPhase, SessionStateMachine},
        timer::{Alarm, Countdown, CountdownTimer, Stamp},
    },
};

const COMMAND_CAPACITY: usize = 64;

/// Error returned by [`QuizEngine`] calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The actor task is gone.
    #[error("quiz engine stopped")]
    Stopped,
}

/// Outcome of [`QuizEngine::start`] and [`QuizEngine::play_again`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The question pool is being fetched.
    Started,
    /// The session already left the idle phase; nothing changed.
    AlreadyStarted,
}

/// Outcome of [`QuizEngine::select_answer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// The answer was locked in for the current question.
    Accepted,
    /// No question is waiting for an answer; nothing changed.
    Ignored,
    /// The index does not name an option of the current question; nothing changed.
    OutOfRange,
}

/// Why a submission was refused without touching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejection {
    /// The session has not finished.
    NotFinished,
    /// The result is already on the leaderboard.
    AlreadySubmitted,
    /// Another submission for this session is still being written.
    InFlight,
}

/// Outcome of [`QuizEngine::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The entry was written and the session is marked submitted.
    Submitted(LeaderboardEntry),
    /// The store write failed; the session stays unsubmitted and may retry.
    Failed(String),
    /// Refused before any I/O.
    Rejected(SubmitRejection),
}

#[derive(Debug)]
enum Command {
    Start {
        reply: oneshot::Sender<StartOutcome>,
    },
    SelectAnswer {
        index: usize,
        reply: oneshot::Sender<SelectOutcome>,
    },
    Submit {
        display_name: String,
        reply: oneshot::Sender<SubmitOutcome>,
    },
    PlayAgain {
        reply: oneshot::Sender<StartOutcome>,
    },
    QuestionsFetched {
        stamp: Stamp,
        result: StorageResult<Vec<QuestionEntity>>,
    },
    Countdown {
        stamp: Stamp,
        step: Countdown,
    },
    RevealElapsed {
        stamp: Stamp,
    },
    DisplayElapsed {
        stamp: Stamp,
    },
    SubmitFinished {
        session: Uuid,
        result: StorageResult<LeaderboardEntryEntity>,
        reply: oneshot::Sender<SubmitOutcome>,
    },
}

/// Handle onto the session actor. Clones share the same session.
#[derive(Clone)]
pub struct QuizEngine {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl QuizEngine {
    /// Spawn the actor on the current Tokio runtime. The session starts idle.
    ///
    /// `settings` are sanitized first, so a zero tick interval or time limit
    /// falls back to the default instead of stalling the countdown.
    pub fn spawn(store: Arc<StoreSlot>, settings: QuizSettings) -> Self {
        let (commands, receiver) = mpsc::channel(COMMAND_CAPACITY);
        let session = SessionRuntime::new();
        let (snapshot_tx, snapshots) = watch::channel(SessionSnapshot::idle(session.id));

        let actor = EngineActor {
            store,
            settings: settings.sanitized(),
            commands: commands.downgrade(),
            snapshots: snapshot_tx,
            clock: SubmissionClock::new(),
            session,
        };
        tokio::spawn(actor.run(receiver));

        Self {
            commands,
            snapshots,
        }
    }

    /// Begin fetching questions. Only an idle session can start.
    pub async fn start(&self) -> Result<StartOutcome, EngineError> {
        self.request(|reply| Command::Start { reply }).await
    }

    /// Lock in `index` as the answer to the current question.
    pub async fn select_answer(&self, index: usize) -> Result<SelectOutcome, EngineError> {
        self.request(|reply| Command::SelectAnswer { index, reply })
            .await
    }

    /// Write the finished session's score to the leaderboard under `display_name`.
    ///
    /// The name is taken verbatim, blank included.
    pub async fn submit(
        &self,
        display_name: impl Into<String>,
    ) -> Result<SubmitOutcome, EngineError> {
        let display_name = display_name.into();
        self.request(|reply| Command::Submit {
            display_name,
            reply,
        })
        .await
    }

    /// Discard the current session, whatever its phase, and start a fresh one.
    pub async fn play_again(&self) -> Result<StartOutcome, EngineError> {
        self.request(|reply| Command::PlayAgain { reply }).await
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified after every transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, EngineError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| EngineError::Stopped)?;
        response.await.map_err(|_| EngineError::Stopped)
    }
}

/// Mutable state of one session instance. Rebuilt wholesale on "play again".
struct SessionRuntime {
    id: Uuid,
    machine: SessionStateMachine,
    generation: u64,
    questions: Arc<[Question]>,
    current_index: usize,
    score: u32,
    time_left_secs: u32,
    selection: Selection,
    submitted: bool,
    submitting: bool,
    error: Option<String>,
    countdown: Option<CountdownTimer>,
    alarm: Option<Alarm>,
}

impl SessionRuntime {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            machine: SessionStateMachine::new(),
            generation: 0,
            questions: Arc::from(Vec::new()),
            current_index: 0,
            score: 0,
            time_left_secs: 0,
            selection: Selection::Unanswered,
            submitted: false,
            submitting: false,
            error: None,
            countdown: None,
            alarm: None,
        }
    }

    fn stamp(&self) -> Stamp {
        Stamp {
            session: self.id,
            generation: self.generation,
        }
    }

    fn phase(&self) -> SessionPhase {
        self.machine.phase()
    }

    /// Apply `event` and invalidate everything scheduled under the previous stamp.
    fn transition(&mut self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = self.machine.apply(event)?;
        self.generation += 1;
        if let Some(countdown) = self.countdown.take() {
            countdown.cancel();
        }
        self.alarm = None;
        debug!(session = %self.id, ?event, phase = ?next, "session transition");
        Ok(next)
    }

    fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    fn snapshot(&self) -> SessionSnapshot {
        let phase = self.phase();
        SessionSnapshot {
            session_id: self.id,
            phase,
            version: self.machine.version(),
            questions: Arc::clone(&self.questions),
            current_index: self.current_index,
            score: self.score,
            time_left_secs: self.time_left_secs,
            selection: self.selection,
            finished: phase == SessionPhase::Finished,
            submitted: self.submitted,
            loading: phase == SessionPhase::Loading,
            error: self.error.clone(),
        }
    }
}

struct EngineActor {
    store: Arc<StoreSlot>,
    settings: QuizSettings,
    commands: mpsc::WeakSender<Command>,
    snapshots: watch::Sender<SessionSnapshot>,
    clock: SubmissionClock,
    session: SessionRuntime,
}

impl EngineActor {
    async fn run(mut self, mut receiver: mpsc::Receiver<Command>) {
        while let Some(command) = receiver.recv().await {
            self.handle(command);
        }
        debug!("quiz engine stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Start { reply } => {
                let _ = reply.send(self.start());
            }
            Command::SelectAnswer { index, reply } => {
                let _ = reply.send(self.select_answer(index));
            }
            Command::Submit {
                display_name,
                reply,
            } => self.submit(display_name, reply),
            Command::PlayAgain { reply } => {
                info!(previous = %self.session.id, "discarding session for a new round");
                self.session = SessionRuntime::new();
                let _ = reply.send(self.start());
            }
            Command::QuestionsFetched { stamp, result } => {
                if self.is_current(stamp) {
                    self.questions_fetched(result);
                }
            }
            Command::Countdown { stamp, step } => {
                if self.is_current(stamp) {
                    self.countdown_step(step);
                }
            }
            Command::RevealElapsed { stamp } => {
                if self.is_current(stamp) {
                    self.reveal_elapsed();
                }
            }
            Command::DisplayElapsed { stamp } => {
                if self.is_current(stamp) {
                    self.display_elapsed();
                }
            }
            Command::SubmitFinished {
                session,
                result,
                reply,
            } => self.submit_finished(session, result, reply),
        }
    }

    fn is_current(&self, stamp: Stamp) -> bool {
        let current = self.session.stamp();
        if stamp != current {
            debug!(?stamp, ?current, "dropping stale session callback");
            return false;
        }
        true
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.session.snapshot());
    }

    fn sender(&self) -> Option<mpsc::Sender<Command>> {
        self.commands.upgrade()
    }

    fn start(&mut self) -> StartOutcome {
        if self.session.transition(SessionEvent::Start).is_err() {
            return StartOutcome::AlreadyStarted;
        }
        self.session.error = None;
        self.publish();

        let Some(tx) = self.sender() else {
            return StartOutcome::Started;
        };
        let store = Arc::clone(&self.store);
        let stamp = self.session.stamp();
        info!(session = %stamp.session, "loading questions");
        tokio::spawn(async move {
            let result = match store.require().await {
                Ok(store) => store.fetch_questions().await,
                Err(err) => Err(err),
            };
            let _ = tx.send(Command::QuestionsFetched { stamp, result }).await;
        });

        StartOutcome::Started
    }

    fn questions_fetched(&mut self, result: StorageResult<Vec<QuestionEntity>>) {
        let pool = match result {
            Ok(pool) => pool,
            Err(err) => {
                self.fail_load(err.to_string());
                return;
            }
        };

        let questions = prepare_questions(
            pool,
            self.settings.questions_per_session,
            &mut rand::rng(),
        );
        if questions.is_empty() {
            self.fail_load("no questions available".into());
            return;
        }

        info!(session = %self.session.id, count = questions.len(), "questions loaded");
        self.session.questions = Arc::from(questions);
        if let Err(err) = self.session.transition(SessionEvent::QuestionsLoaded) {
            warn!(error = %err, "unexpected transition while loading");
            return;
        }
        self.enter_question(0);
    }

    fn fail_load(&mut self, message: String) {
        warn!(session = %self.session.id, error = %message, "failed to load questions");
        if let Err(err) = self.session.transition(SessionEvent::LoadFailed) {
            warn!(error = %err, "unexpected transition while loading");
            return;
        }
        self.session.error = Some(message);
        self.publish();
    }

    /// Reset per-question state and arm a fresh countdown.
    fn enter_question(&mut self, index: usize) {
        let limit = self.settings.time_limit_secs;
        self.session.current_index = index;
        self.session.selection = Selection::Unanswered;
        self.session.time_left_secs = limit;

        if let Some(tx) = self.sender() {
            let stamp = self.session.stamp();
            self.session.countdown = Some(CountdownTimer::start(
                limit,
                self.settings.tick_interval,
                tx,
                move |step| Command::Countdown { stamp, step },
            ));
        }
        self.publish();
    }

    fn countdown_step(&mut self, step: Countdown) {
        match step {
            Countdown::Tick(remaining) => {
                self.session.time_left_secs = remaining;
                self.publish();
            }
            Countdown::Expired => {
                self.session.time_left_secs = 0;
                if let Err(err) = self.session.transition(SessionEvent::TimedOut) {
                    warn!(error = %err, "countdown expired outside of answering");
                    return;
                }
                self.session.selection = Selection::TimedOut;
                debug!(session = %self.session.id, index = self.session.current_index, "question timed out");
                self.resolve_current();
            }
        }
    }

    fn select_answer(&mut self, index: usize) -> SelectOutcome {
        if !self.session.machine.can_apply(SessionEvent::AnswerLocked)
            || !self.session.selection.is_pending()
        {
            return SelectOutcome::Ignored;
        }
        let Some(question) = self.session.current_question() else {
            return SelectOutcome::Ignored;
        };
        if index >= question.options.len() {
            return SelectOutcome::OutOfRange;
        }

        if let Err(err) = self.session.transition(SessionEvent::AnswerLocked) {
            warn!(error = %err, "answer rejected by state machine");
            return SelectOutcome::Ignored;
        }
        self.session.selection = Selection::Chosen(index);

        if let Some(tx) = self.sender() {
            let stamp = self.session.stamp();
            self.session.alarm = Some(Alarm::schedule(
                self.settings.reveal_delay,
                tx,
                Command::RevealElapsed { stamp },
            ));
        }
        self.publish();
        SelectOutcome::Accepted
    }

    fn reveal_elapsed(&mut self) {
        if let Err(err) = self.session.transition(SessionEvent::Resolve) {
            warn!(error = %err, "reveal elapsed outside of a locked answer");
            return;
        }
        self.resolve_current();
    }

    /// Score the current selection and schedule the advance.
    fn resolve_current(&mut self) {
        let Some(question) = self.session.current_question() else {
            return;
        };
        let delta = score_delta(question.correct_option_index, self.session.selection);
        self.session.score += delta;
        debug!(
            session = %self.session.id,
            index = self.session.current_index,
            selection = ?self.session.selection,
            delta,
            score = self.session.score,
            "question resolved"
        );

        if let Some(tx) = self.sender() {
            let stamp = self.session.stamp();
            self.session.alarm = Some(Alarm::schedule(
                self.settings.display_delay,
                tx,
                Command::DisplayElapsed { stamp },
            ));
        }
        self.publish();
    }

    fn display_elapsed(&mut self) {
        let next = self.session.current_index + 1;
        if next < self.session.questions.len() {
            if let Err(err) = self.session.transition(SessionEvent::NextQuestion) {
                warn!(error = %err, "cannot advance to next question");
                return;
            }
            self.enter_question(next);
            return;
        }

        if let Err(err) = self.session.transition(SessionEvent::Finish) {
            warn!(error = %err, "cannot finish session");
            return;
        }
        self.session.current_index = self.session.questions.len();
        self.session.time_left_secs = 0;
        info!(
            session = %self.session.id,
            score = self.session.score,
            questions = self.session.questions.len(),
            "session finished"
        );
        self.publish();
    }

    fn submit(&mut self, display_name: String, reply: oneshot::Sender<SubmitOutcome>) {
        let rejection = if self.session.phase() != SessionPhase::Finished {
            Some(SubmitRejection::NotFinished)
        } else if self.session.submitted {
            Some(SubmitRejection::AlreadySubmitted)
        } else if self.session.submitting {
            Some(SubmitRejection::InFlight)
        } else {
            None
        };
        if let Some(rejection) = rejection {
            let _ = reply.send(SubmitOutcome::Rejected(rejection));
            return;
        }

        let Some(tx) = self.sender() else {
            let _ = reply.send(SubmitOutcome::Failed(EngineError::Stopped.to_string()));
            return;
        };

        let entry = NewLeaderboardEntry {
            display_name,
            score: self.session.score,
            timestamp_ms: self.clock.next(),
        };
        self.session.submitting = true;
        let store = Arc::clone(&self.store);
        let session = self.session.id;
        info!(%session, score = entry.score, "submitting result");
        tokio::spawn(async move {
            let result = match store.require().await {
                Ok(store) => store.submit_entry(entry).await,
                Err(err) => Err(err),
            };
            let _ = tx
                .send(Command::SubmitFinished {
                    session,
                    result,
                    reply,
                })
                .await;
        });
    }

    fn submit_finished(
        &mut self,
        session: Uuid,
        result: StorageResult<LeaderboardEntryEntity>,
        reply: oneshot::Sender<SubmitOutcome>,
    ) {
        let current = session == self.session.id;
        if current {
            self.session.submitting = false;
        }

        let outcome = match result {
            Ok(entry) => {
                if current {
                    self.session.submitted = true;
                    self.publish();
                }
                info!(%session, entry = %entry.id, "result submitted");
                SubmitOutcome::Submitted(entry.into())
            }
            Err(err) => {
                warn!(%session, error = %err, "failed to submit result");
                SubmitOutcome::Failed(err.to_string())
            }
        };
        let _ = reply.send(outcome);
    }
}
