//! Quiz master binary entrypoint wiring the session engine, REST, SSE and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, bail};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quiz_master_back::{
    config::AppConfig,
    dao::{
        quiz_store::{QuizStore, memory::MemoryQuizStore},
        storage::StorageError,
    },
    routes,
    services::{sse_events, storage_supervisor},
    state::{AppState, SharedState},
};

/// Storage backend selected through `QUIZ_STORE`.
#[derive(Debug, Clone, Copy)]
enum StoreKind {
    Memory,
    #[cfg(feature = "couch-store")]
    Couch,
    #[cfg(feature = "mongo-store")]
    Mongo,
}

impl StoreKind {
    fn from_env() -> anyhow::Result<Self> {
        let value = env::var("QUIZ_STORE").unwrap_or_default();
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "memory" => Ok(Self::Memory),
            #[cfg(feature = "couch-store")]
            "couch" | "couchdb" => Ok(Self::Couch),
            #[cfg(feature = "mongo-store")]
            "mongo" | "mongodb" => Ok(Self::Mongo),
            other => bail!("unsupported QUIZ_STORE value `{other}`"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let store_kind = StoreKind::from_env()?;
    let app_state = AppState::new(config);

    sse_events::spawn_session_forwarder(app_state.clone());
    sse_events::spawn_status_forwarder(app_state.clone());
    spawn_storage_supervisor(app_state.clone(), store_kind);

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, store = ?store_kind, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Run the storage supervisor for the selected backend in the background.
fn spawn_storage_supervisor(state: SharedState, kind: StoreKind) {
    match kind {
        StoreKind::Memory => {
            let store = MemoryQuizStore::new();
            tokio::spawn(storage_supervisor::run(state, move || {
                let store = store.clone();
                async move { Ok::<Arc<dyn QuizStore>, StorageError>(Arc::new(store)) }
            }));
        }
        #[cfg(feature = "couch-store")]
        StoreKind::Couch => {
            use quiz_master_back::dao::quiz_store::couchdb::{CouchConfig, CouchQuizStore};

            tokio::spawn(storage_supervisor::run(state, || async {
                let config = CouchConfig::from_env()?;
                let store = CouchQuizStore::connect(config).await?;
                Ok::<Arc<dyn QuizStore>, StorageError>(Arc::new(store))
            }));
        }
        #[cfg(feature = "mongo-store")]
        StoreKind::Mongo => {
            use quiz_master_back::dao::quiz_store::mongodb::{MongoConfig, MongoQuizStore};

            tokio::spawn(storage_supervisor::run(state, || async {
                let config = MongoConfig::from_env().await?;
                let store = MongoQuizStore::connect(config).await?;
                Ok::<Arc<dyn QuizStore>, StorageError>(Arc::new(store))
            }));
        }
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
