use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use axum_valid::Valid;

use crate::{
    dto::leaderboard::{LeaderboardQuery, LeaderboardResponse},
    services::leaderboard_service,
    state::SharedState,
};

/// Read-only ranked results.
pub fn router() -> Router<SharedState> {
    Router::new().route("/leaderboard", get(get_leaderboard))
}

#[utoipa::path(
    get,
    path = "/leaderboard",
    tag = "leaderboard",
    params(LeaderboardQuery),
    responses(
        (status = 200, description = "Top entries by score, earliest first on ties; `error` is set when the store could not be read", body = LeaderboardResponse),
        (status = 400, description = "Limit outside 1-100")
    )
)]
/// Return the top entries of the leaderboard.
pub async fn get_leaderboard(
    State(state): State<SharedState>,
    Valid(Query(query)): Valid<Query<LeaderboardQuery>>,
) -> Json<LeaderboardResponse> {
    Json(leaderboard_service::top(&state, query.limit).await)
}
