use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{
        models::QuestionEntity,
        quiz_store::QuizStore,
        storage::{StorageError, StorageResult},
    },
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Doubling delay capped at [`MAX_DELAY`].
#[derive(Debug)]
struct Backoff {
    next: Duration,
}

impl Backoff {
    fn new() -> Self {
        Self {
            next: INITIAL_DELAY,
        }
    }

    fn reset(&mut self) {
        self.next = INITIAL_DELAY;
    }

    async fn wait(&mut self) {
        sleep(self.next).await;
        self.next = (self.next * 2).min(MAX_DELAY);
    }
}

/// Connect to the storage backend and keep the shared state in degraded mode while it is unavailable.
///
/// Runs forever: on a fresh connection the question pool is seeded when empty,
/// the store is installed and its health polled; repeated health failures drop
/// the store and start over with exponential backoff.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn QuizStore>, StorageError>> + Send,
{
    let mut backoff = Backoff::new();

    loop {
        let store = match connect().await {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                backoff.wait().await;
                continue;
            }
        };

        if let Err(err) = seed_questions(store.as_ref(), state.config().seed_questions()).await {
            warn!(error = %err, "failed to seed question pool");
        }
        state.set_quiz_store(store.clone()).await;
        info!("storage connection established; leaving degraded mode");
        backoff.reset();

        supervise(&state, store.as_ref()).await;
        state.clear_quiz_store().await;
        backoff.wait().await;
    }
}

/// Poll `store` until it fails and cannot be reconnected.
async fn supervise(state: &SharedState, store: &dyn QuizStore) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded().await {
                    info!("storage healthy again; leaving degraded mode");
                    state.update_degraded(false).await;
                }
            }
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                if !reconnect(state, store).await {
                    warn!("exhausted storage reconnect attempts; staying in degraded mode");
                    return;
                }
                state.update_degraded(false).await;
            }
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

async fn reconnect(state: &SharedState, store: &dyn QuizStore) -> bool {
    let mut backoff = Backoff::new();

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded after health check failure");
                return true;
            }
            Err(err) if attempt == 0 => {
                warn!(
                    attempt, error = %err,
                    "storage reconnect first attempt failed; entering degraded mode"
                );
                state.update_degraded(true).await;
            }
            Err(err) => warn!(attempt, error = %err, "storage reconnect attempt failed"),
        }
        backoff.wait().await;
    }

    false
}

/// Write `questions` into `store` when its pool is empty. Returns how many were written.
pub async fn seed_questions(
    store: &dyn QuizStore,
    questions: &[QuestionEntity],
) -> StorageResult<usize> {
    if !store.fetch_questions().await?.is_empty() {
        return Ok(0);
    }

    for question in questions {
        store.save_question(question.clone()).await?;
    }
    info!(count = questions.len(), "seeded empty question pool");
    Ok(questions.len())
}
