use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use futures::future::BoxFuture;
use tokio::{
    sync::watch,
    time::{Instant, sleep},
};

use quiz_master_back::{
    config::QuizSettings,
    dao::{
        models::{LeaderboardEntryEntity, NewLeaderboardEntry, QuestionEntity},
        quiz_store::{QuizStore, StoreSlot, memory::MemoryQuizStore},
        storage::{StorageError, StorageResult},
    },
    state::{
        engine::{QuizEngine, SelectOutcome, StartOutcome, SubmitOutcome, SubmitRejection},
        leaderboard::ANONYMOUS,
        session::{Selection, SessionSnapshot},
        state_machine::{QuestionPhase, SessionPhase},
    },
};

const ANSWERING: SessionPhase = SessionPhase::InQuestion(QuestionPhase::Answering);
const LOCKED: SessionPhase = SessionPhase::InQuestion(QuestionPhase::Locked);
const RESOLVED: SessionPhase = SessionPhase::InQuestion(QuestionPhase::Resolved);

fn question(id: &str, correct: usize) -> QuestionEntity {
    QuestionEntity {
        id: id.into(),
        text: format!("prompt {id}"),
        options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
        correct_option_index: correct,
    }
}

/// Memory store whose submission path can be slowed down or made to fail.
#[derive(Clone, Default)]
struct ScriptedStore {
    inner: MemoryQuizStore,
    fail_submit: Arc<AtomicBool>,
    submit_delay: Duration,
}

impl ScriptedStore {
    fn with_questions(questions: impl IntoIterator<Item = QuestionEntity>) -> Self {
        Self {
            inner: MemoryQuizStore::with_questions(questions),
            ..Self::default()
        }
    }
}

impl QuizStore for ScriptedStore {
    fn fetch_questions(&self) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        self.inner.fetch_questions()
    }

    fn save_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.save_question(question)
    }

    fn submit_entry(
        &self,
        entry: NewLeaderboardEntry,
    ) -> BoxFuture<'static, StorageResult<LeaderboardEntryEntity>> {
        let store = self.clone();
        Box::pin(async move {
            sleep(store.submit_delay).await;
            if store.fail_submit.load(Ordering::SeqCst) {
                return Err(StorageError::unavailable(
                    "leaderboard write rejected".into(),
                    std::io::Error::other("connection reset"),
                ));
            }
            store.inner.submit_entry(entry).await
        })
    }

    fn fetch_ranked(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntryEntity>>> {
        self.inner.fetch_ranked(limit)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}

fn spawn_engine(store: impl QuizStore + 'static, settings: QuizSettings) -> QuizEngine {
    let slot = StoreSlot::with_store(Arc::new(store));
    QuizEngine::spawn(Arc::new(slot), settings)
}

async fn wait_for(
    snapshots: &mut watch::Receiver<SessionSnapshot>,
    predicate: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    snapshots.wait_for(predicate).await.unwrap().clone()
}

fn correct_index(snapshot: &SessionSnapshot) -> usize {
    snapshot.current_question().unwrap().correct_option_index
}

/// Answer every question correctly and wait for the session to finish.
async fn play_perfect_round(engine: &QuizEngine) -> SessionSnapshot {
    let mut snapshots = engine.subscribe();
    assert_eq!(engine.start().await.unwrap(), StartOutcome::Started);

    loop {
        let snapshot = wait_for(&mut snapshots, |s| s.phase == ANSWERING || s.finished).await;
        if snapshot.finished {
            return snapshot;
        }
        let outcome = engine.select_answer(correct_index(&snapshot)).await.unwrap();
        assert_eq!(outcome, SelectOutcome::Accepted);
        wait_for(&mut snapshots, |s| s.phase == RESOLVED).await;
    }
}

#[tokio::test(start_paused = true)]
async fn answered_then_timed_out_session_scores_one() {
    let engine = spawn_engine(
        ScriptedStore::with_questions([question("q1", 1), question("q2", 0)]),
        QuizSettings::default(),
    );
    let mut snapshots = engine.subscribe();
    let started = Instant::now();

    assert_eq!(engine.start().await.unwrap(), StartOutcome::Started);
    let first = wait_for(&mut snapshots, |s| s.phase == ANSWERING).await;
    assert_eq!(first.current_index, 0);
    assert_eq!(first.question_count(), 2);
    assert_eq!(first.time_left_secs, 10);
    assert_eq!(first.selection, Selection::Unanswered);

    sleep(Duration::from_millis(2_500)).await;
    assert_eq!(engine.snapshot().time_left_secs, 8);

    let correct = correct_index(&first);
    assert_eq!(engine.select_answer(correct).await.unwrap(), SelectOutcome::Accepted);
    let locked = engine.snapshot();
    assert_eq!(locked.phase, LOCKED);
    assert_eq!(locked.selection, Selection::Chosen(correct));
    assert_eq!(locked.score, 0);

    let resolved = wait_for(&mut snapshots, |s| s.phase == RESOLVED).await;
    assert_eq!(resolved.score, 1);
    assert_eq!(resolved.time_left_secs, 8, "countdown kept ticking after the answer");

    let second = wait_for(&mut snapshots, |s| s.phase == ANSWERING).await;
    assert_eq!(second.current_index, 1);
    assert_eq!(second.time_left_secs, 10);
    assert_eq!(second.selection, Selection::Unanswered);

    let timed_out = wait_for(&mut snapshots, |s| s.selection == Selection::TimedOut).await;
    assert_eq!(timed_out.phase, RESOLVED);
    assert_eq!(timed_out.time_left_secs, 0);
    assert_eq!(timed_out.score, 1);

    let finished = wait_for(&mut snapshots, |s| s.finished).await;
    assert_eq!(finished.score, 1);
    assert_eq!(finished.current_index, 2);
    assert_eq!(finished.time_left_secs, 0);
    assert!(!finished.submitted);
    assert!(finished.current_question().is_none());
    assert_eq!(started.elapsed(), Duration::from_millis(2_500 + 500 + 1_500 + 10_000 + 1_500));
}

#[tokio::test(start_paused = true)]
async fn second_selection_for_the_same_question_is_ignored() {
    let engine = spawn_engine(
        ScriptedStore::with_questions([question("q1", 2)]),
        QuizSettings::default(),
    );
    let mut snapshots = engine.subscribe();
    engine.start().await.unwrap();
    wait_for(&mut snapshots, |s| s.phase == ANSWERING).await;

    assert_eq!(engine.select_answer(0).await.unwrap(), SelectOutcome::Accepted);
    let before = engine.snapshot();

    assert_eq!(engine.select_answer(2).await.unwrap(), SelectOutcome::Ignored);
    let after = engine.snapshot();
    assert_eq!(after.version, before.version);
    assert_eq!(after.selection, Selection::Chosen(0));

    let finished = wait_for(&mut snapshots, |s| s.finished).await;
    assert_eq!(finished.score, 0);
}

#[tokio::test(start_paused = true)]
async fn out_of_range_selection_changes_nothing() {
    let engine = spawn_engine(
        ScriptedStore::with_questions([question("q1", 0)]),
        QuizSettings::default(),
    );
    let mut snapshots = engine.subscribe();
    engine.start().await.unwrap();
    let before = wait_for(&mut snapshots, |s| s.phase == ANSWERING).await;

    assert_eq!(engine.select_answer(4).await.unwrap(), SelectOutcome::OutOfRange);
    let after = engine.snapshot();
    assert_eq!(after.version, before.version);
    assert_eq!(after.selection, Selection::Unanswered);
    assert_eq!(after.phase, ANSWERING);
}

#[tokio::test(start_paused = true)]
async fn timeout_scores_like_a_wrong_answer() {
    let settings = QuizSettings {
        time_limit_secs: 2,
        ..QuizSettings::default()
    };

    let wrong = spawn_engine(
        ScriptedStore::with_questions([question("q1", 0)]),
        settings.clone(),
    );
    let mut snapshots = wrong.subscribe();
    wrong.start().await.unwrap();
    wait_for(&mut snapshots, |s| s.phase == ANSWERING).await;
    wrong.select_answer(3).await.unwrap();
    let wrong_score = wait_for(&mut snapshots, |s| s.finished).await.score;

    let silent = spawn_engine(ScriptedStore::with_questions([question("q1", 0)]), settings);
    let mut snapshots = silent.subscribe();
    silent.start().await.unwrap();
    let timed_out = wait_for(&mut snapshots, |s| s.selection == Selection::TimedOut).await;
    let silent_score = wait_for(&mut snapshots, |s| s.finished).await.score;

    assert_eq!(timed_out.score, 0);
    assert_eq!(wrong_score, 0);
    assert_eq!(silent_score, wrong_score);
}

#[tokio::test(start_paused = true)]
async fn countdown_ticks_strictly_decrease() {
    let settings = QuizSettings {
        time_limit_secs: 4,
        ..QuizSettings::default()
    };
    let engine = spawn_engine(ScriptedStore::with_questions([question("q1", 0)]), settings);
    let mut snapshots = engine.subscribe();
    engine.start().await.unwrap();
    wait_for(&mut snapshots, |s| s.phase == ANSWERING).await;

    let mut seen = vec![engine.snapshot().time_left_secs];
    while snapshots.changed().await.is_ok() {
        let snapshot = snapshots.borrow_and_update().clone();
        if snapshot.phase != ANSWERING {
            break;
        }
        seen.push(snapshot.time_left_secs);
    }

    assert_eq!(seen, [4, 3, 2, 1]);
}

#[tokio::test(start_paused = true)]
async fn failed_question_load_surfaces_an_error() {
    let engine = QuizEngine::spawn(Arc::new(StoreSlot::new()), QuizSettings::default());
    let mut snapshots = engine.subscribe();

    engine.start().await.unwrap();
    let failed = wait_for(&mut snapshots, |s| s.phase == SessionPhase::Failed).await;
    assert!(!failed.loading);
    assert!(!failed.finished);
    assert!(failed.error.is_some());

    assert_eq!(engine.select_answer(0).await.unwrap(), SelectOutcome::Ignored);
    assert_eq!(engine.start().await.unwrap(), StartOutcome::AlreadyStarted);
}

#[tokio::test(start_paused = true)]
async fn unplayable_pool_fails_the_load() {
    let broken = QuestionEntity {
        options: vec!["only".into()],
        ..question("q1", 0)
    };
    let engine = spawn_engine(
        ScriptedStore::with_questions([broken]),
        QuizSettings::default(),
    );
    let mut snapshots = engine.subscribe();

    engine.start().await.unwrap();
    let failed = wait_for(&mut snapshots, |s| s.phase == SessionPhase::Failed).await;
    assert_eq!(failed.error.as_deref(), Some("no questions available"));
}

#[tokio::test(start_paused = true)]
async fn session_size_is_capped_by_settings() {
    let settings = QuizSettings {
        questions_per_session: Some(2),
        ..QuizSettings::default()
    };
    let engine = spawn_engine(
        ScriptedStore::with_questions((0..5).map(|i| question(&format!("q{i}"), 0))),
        settings,
    );
    let mut snapshots = engine.subscribe();
    engine.start().await.unwrap();

    let snapshot = wait_for(&mut snapshots, |s| s.phase == ANSWERING).await;
    assert_eq!(snapshot.question_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn blank_name_submission_is_stored_and_shown_anonymous() {
    let store = ScriptedStore::with_questions([
        question("q1", 0),
        question("q2", 1),
        question("q3", 2),
    ]);
    let engine = spawn_engine(store.clone(), QuizSettings::default());

    let finished = play_perfect_round(&engine).await;
    assert_eq!(finished.score, 3);

    let SubmitOutcome::Submitted(entry) = engine.submit("").await.unwrap() else {
        panic!("submission should succeed");
    };
    assert_eq!(entry.display_name, "");
    assert_eq!(entry.shown_name(), ANONYMOUS);
    assert_eq!(entry.score, 3);
    assert!(engine.snapshot().submitted);

    let ranked = store.fetch_ranked(20).await.unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].display_name, "");
}

#[tokio::test(start_paused = true)]
async fn resubmission_after_success_is_rejected() {
    let store = ScriptedStore::with_questions([question("q1", 0)]);
    let engine = spawn_engine(store.clone(), QuizSettings::default());
    play_perfect_round(&engine).await;

    assert!(matches!(
        engine.submit("Ada").await.unwrap(),
        SubmitOutcome::Submitted(_)
    ));
    assert_eq!(
        engine.submit("Ada").await.unwrap(),
        SubmitOutcome::Rejected(SubmitRejection::AlreadySubmitted)
    );
    assert_eq!(store.inner.entry_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn submission_before_finish_is_rejected() {
    let engine = spawn_engine(
        ScriptedStore::with_questions([question("q1", 0)]),
        QuizSettings::default(),
    );
    assert_eq!(
        engine.submit("Ada").await.unwrap(),
        SubmitOutcome::Rejected(SubmitRejection::NotFinished)
    );

    let mut snapshots = engine.subscribe();
    engine.start().await.unwrap();
    wait_for(&mut snapshots, |s| s.phase == ANSWERING).await;
    assert_eq!(
        engine.submit("Ada").await.unwrap(),
        SubmitOutcome::Rejected(SubmitRejection::NotFinished)
    );
}

#[tokio::test(start_paused = true)]
async fn failed_write_leaves_session_unsubmitted_and_retryable() {
    let store = ScriptedStore::with_questions([question("q1", 0), question("q2", 0)]);
    store.fail_submit.store(true, Ordering::SeqCst);
    let engine = spawn_engine(store.clone(), QuizSettings::default());
    let finished = play_perfect_round(&engine).await;

    let outcome = engine.submit("Ada").await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Failed(_)));
    let after_failure = engine.snapshot();
    assert!(!after_failure.submitted);
    assert_eq!(after_failure.score, finished.score);
    assert_eq!(store.inner.entry_count(), 0);

    store.fail_submit.store(false, Ordering::SeqCst);
    let SubmitOutcome::Submitted(entry) = engine.submit("Ada").await.unwrap() else {
        panic!("retry should succeed");
    };
    assert_eq!(entry.score, 2);
    assert!(engine.snapshot().submitted);
}

#[tokio::test(start_paused = true)]
async fn concurrent_submission_is_reported_in_flight() {
    let store = ScriptedStore {
        submit_delay: Duration::from_secs(1),
        ..ScriptedStore::with_questions([question("q1", 0)])
    };
    let engine = spawn_engine(store.clone(), QuizSettings::default());
    play_perfect_round(&engine).await;

    let (first, second) = tokio::join!(engine.submit("Ada"), engine.submit("Grace"));
    assert!(matches!(first.unwrap(), SubmitOutcome::Submitted(_)));
    assert_eq!(
        second.unwrap(),
        SubmitOutcome::Rejected(SubmitRejection::InFlight)
    );
    assert_eq!(store.inner.entry_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn play_again_rebuilds_the_session() {
    let engine = spawn_engine(
        ScriptedStore::with_questions([question("q1", 0), question("q2", 1)]),
        QuizSettings::default(),
    );
    let finished = play_perfect_round(&engine).await;
    assert!(matches!(
        engine.submit("Ada").await.unwrap(),
        SubmitOutcome::Submitted(_)
    ));

    let mut snapshots = engine.subscribe();
    assert_eq!(engine.play_again().await.unwrap(), StartOutcome::Started);
    let restarted = wait_for(&mut snapshots, |s| s.phase == ANSWERING).await;

    assert_ne!(restarted.session_id, finished.session_id);
    assert_eq!(restarted.score, 0);
    assert_eq!(restarted.current_index, 0);
    assert_eq!(restarted.time_left_secs, 10);
    assert!(!restarted.submitted);
    assert!(!restarted.finished);
    assert_eq!(restarted.question_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn play_again_mid_question_silences_the_old_countdown() {
    let engine = spawn_engine(
        ScriptedStore::with_questions([question("q1", 0)]),
        QuizSettings::default(),
    );
    let mut snapshots = engine.subscribe();
    engine.start().await.unwrap();
    wait_for(&mut snapshots, |s| s.phase == ANSWERING).await;

    sleep(Duration::from_millis(3_500)).await;
    assert_eq!(engine.snapshot().time_left_secs, 7);

    engine.play_again().await.unwrap();
    let restarted = wait_for(&mut snapshots, |s| s.phase == ANSWERING).await;
    assert_eq!(restarted.time_left_secs, 10);

    sleep(Duration::from_millis(1_500)).await;
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.session_id, restarted.session_id);
    assert_eq!(snapshot.time_left_secs, 9);
}

#[tokio::test(start_paused = true)]
async fn score_never_decreases_across_a_session() {
    let engine = spawn_engine(
        ScriptedStore::with_questions((0..4).map(|i| question(&format!("q{i}"), i % 4))),
        QuizSettings::default(),
    );
    let mut snapshots = engine.subscribe();
    engine.start().await.unwrap();

    let mut last_score = 0;
    let mut answered = 0;
    loop {
        let snapshot = wait_for(&mut snapshots, |s| s.phase == ANSWERING || s.finished).await;
        assert!(snapshot.score >= last_score);
        assert!(snapshot.score <= answered);
        last_score = snapshot.score;
        if snapshot.finished {
            break;
        }
        // Alternate right and wrong answers.
        let correct = correct_index(&snapshot);
        let pick = if snapshot.current_index % 2 == 0 {
            correct
        } else {
            (correct + 1) % 4
        };
        engine.select_answer(pick).await.unwrap();
        answered += 1;
        wait_for(&mut snapshots, |s| s.phase == RESOLVED).await;
    }

    assert_eq!(last_score, 2);
}

#[tokio::test(start_paused = true)]
async fn answer_at_expiry_instant_resolves_once() {
    let engine = spawn_engine(
        ScriptedStore::with_questions([question("q1", 2)]),
        QuizSettings::default(),
    );
    let mut snapshots = engine.subscribe();
    engine.start().await.unwrap();
    wait_for(&mut snapshots, |s| s.phase == ANSWERING).await;

    sleep(Duration::from_secs(10)).await;
    let outcome = engine.select_answer(2).await.unwrap();
    let finished = wait_for(&mut snapshots, |s| s.finished).await;

    // Start, load, then either lock + resolve or a single timeout, then finish.
    match outcome {
        SelectOutcome::Accepted => {
            assert_eq!(finished.selection, Selection::Chosen(2));
            assert_eq!(finished.score, 1);
            assert_eq!(finished.version, 5);
        }
        SelectOutcome::Ignored => {
            assert_eq!(finished.selection, Selection::TimedOut);
            assert_eq!(finished.score, 0);
            assert_eq!(finished.version, 4);
        }
        SelectOutcome::OutOfRange => panic!("index 2 is a valid option"),
    }
    assert!(finished.score <= 1);
    assert_eq!(finished.current_index, 1);

    sleep(Duration::from_secs(15)).await;
    let later = engine.snapshot();
    assert_eq!(later.version, finished.version);
    assert_eq!(later.score, finished.score);
}

#[tokio::test(start_paused = true)]
async fn play_again_discards_pending_reveal_and_advance() {
    let engine = spawn_engine(
        ScriptedStore::with_questions([question("q1", 0), question("q2", 1)]),
        QuizSettings::default(),
    );
    let mut snapshots = engine.subscribe();
    engine.start().await.unwrap();
    let first = wait_for(&mut snapshots, |s| s.phase == ANSWERING).await;

    // Restart while the reveal delay is pending.
    engine.select_answer(correct_index(&first)).await.unwrap();
    assert_eq!(engine.snapshot().phase, LOCKED);
    engine.play_again().await.unwrap();
    let second = wait_for(&mut snapshots, |s| {
        s.phase == ANSWERING && s.session_id != first.session_id
    })
    .await;

    sleep(Duration::from_millis(2_500)).await;
    let after_reveal = engine.snapshot();
    assert_eq!(after_reveal.session_id, second.session_id);
    assert_eq!(after_reveal.phase, ANSWERING);
    assert_eq!(after_reveal.current_index, 0);
    assert_eq!(after_reveal.score, 0);
    assert_eq!(after_reveal.selection, Selection::Unanswered);

    // Restart while the display delay is pending.
    engine.select_answer(correct_index(&second)).await.unwrap();
    let resolved = wait_for(&mut snapshots, |s| s.phase == RESOLVED).await;
    assert_eq!(resolved.score, 1);
    engine.play_again().await.unwrap();
    let third = wait_for(&mut snapshots, |s| {
        s.phase == ANSWERING && s.session_id != second.session_id
    })
    .await;

    sleep(Duration::from_millis(2_500)).await;
    let after_display = engine.snapshot();
    assert_eq!(after_display.session_id, third.session_id);
    assert_eq!(after_display.phase, ANSWERING);
    assert_eq!(after_display.current_index, 0);
    assert_eq!(after_display.score, 0);
    assert_eq!(after_display.selection, Selection::Unanswered);
}

#[tokio::test(start_paused = true)]
async fn zero_timings_fall_back_to_defaults() {
    let settings = QuizSettings {
        time_limit_secs: 0,
        tick_interval: Duration::ZERO,
        ..QuizSettings::default()
    };
    let engine = spawn_engine(ScriptedStore::with_questions([question("q1", 0)]), settings);
    let mut snapshots = engine.subscribe();
    engine.start().await.unwrap();

    let answering = wait_for(&mut snapshots, |s| s.phase == ANSWERING).await;
    assert_eq!(answering.time_left_secs, 10);

    sleep(Duration::from_millis(1_500)).await;
    assert_eq!(engine.snapshot().time_left_secs, 9);

    let finished = wait_for(&mut snapshots, |s| s.finished).await;
    assert_eq!(finished.selection, Selection::TimedOut);
}
