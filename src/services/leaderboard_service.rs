use crate::{
    dto::leaderboard::LeaderboardResponse,
    state::{SharedState, leaderboard},
};

/// Read the ranked list. Failures are reported inside the payload, never as an error.
pub async fn top(state: &SharedState, limit: Option<usize>) -> LeaderboardResponse {
    let limit = limit.unwrap_or(state.config().settings().leaderboard_limit);
    leaderboard::fetch_top(state.store(), limit).await.into()
}
