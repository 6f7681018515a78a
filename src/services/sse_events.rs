use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    dto::{
        leaderboard::LeaderboardEntryDto,
        session::SessionResponse,
        sse::{ServerEvent, SystemStatus},
    },
    state::{SharedState, session::SessionSnapshot},
};

const EVENT_SESSION_SNAPSHOT: &str = "session.snapshot";
const EVENT_LEADERBOARD_ENTRY: &str = "leaderboard.entry";
const EVENT_SYSTEM_STATUS: &str = "system.status";

/// Broadcast the session state after a transition.
pub fn broadcast_session_snapshot(state: &SharedState, snapshot: &SessionSnapshot) {
    let payload = SessionResponse::from(snapshot);
    send_public_event(state, EVENT_SESSION_SNAPSHOT, &payload);
}

/// Broadcast a freshly submitted leaderboard entry.
pub fn broadcast_leaderboard_entry(state: &SharedState, entry: &LeaderboardEntryDto) {
    send_public_event(state, EVENT_LEADERBOARD_ENTRY, entry);
}

/// Broadcast a degraded mode change.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    send_public_event(state, EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
}

/// Forward every published session snapshot onto the public stream.
pub fn spawn_session_forwarder(state: SharedState) -> JoinHandle<()> {
    let mut snapshots = state.engine().subscribe();
    tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            debug!(version = snapshot.version, phase = ?snapshot.phase, "forwarding session snapshot");
            broadcast_session_snapshot(&state, &snapshot);
        }
    })
}

/// Forward degraded mode changes onto the public stream.
pub fn spawn_status_forwarder(state: SharedState) -> JoinHandle<()> {
    let mut degraded = state.degraded_watcher();
    tokio::spawn(async move {
        while degraded.changed().await.is_ok() {
            let value = *degraded.borrow_and_update();
            broadcast_system_status(&state, value);
        }
    })
}

fn send_public_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.public_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize public SSE payload"),
    }
}
