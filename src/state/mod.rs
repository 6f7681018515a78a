pub mod engine;
pub mod leaderboard;
pub mod scoring;
pub mod session;
mod sse;
pub mod state_machine;
pub mod timer;

use std::sync::Arc;

use tokio::sync::watch;

use crate::{
    config::AppConfig,
    dao::quiz_store::{QuizStore, StoreSlot},
    state::engine::QuizEngine,
};

pub use self::sse::SseHub;

pub type SharedState = Arc<AppState>;

const SSE_CAPACITY: usize = 32;

/// Central application state: the storage slot, the session engine and the SSE hub.
pub struct AppState {
    store: Arc<StoreSlot>,
    engine: QuizEngine,
    sse: SseHub,
    degraded: watch::Sender<bool>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// Spawns the session engine, so this must run inside a Tokio runtime. The
    /// application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let store = Arc::new(StoreSlot::new());
        Self::with_slot(store, config)
    }

    /// Build the state around an existing slot. Starts degraded until the flag is cleared.
    pub fn with_slot(store: Arc<StoreSlot>, config: AppConfig) -> SharedState {
        let engine = QuizEngine::spawn(Arc::clone(&store), config.settings().clone());
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store,
            engine,
            sse: SseHub::new(SSE_CAPACITY),
            degraded: degraded_tx,
            config,
        })
    }

    /// Handle onto the quiz session engine.
    pub fn engine(&self) -> &QuizEngine {
        &self.engine
    }

    /// Slot holding the current storage backend.
    pub fn store(&self) -> &Arc<StoreSlot> {
        &self.store
    }

    /// Loaded application configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        &self.sse
    }

    /// Install a new quiz store implementation and leave degraded mode.
    pub async fn set_quiz_store(&self, store: Arc<dyn QuizStore>) {
        self.store.install(store).await;
        self.update_degraded(false).await;
    }

    /// Remove the current quiz store and enter degraded mode.
    pub async fn clear_quiz_store(&self) {
        self.store.clear().await;
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow() || !self.store.is_installed().await
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }
}
