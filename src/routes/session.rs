use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::{
        leaderboard::LeaderboardEntryDto,
        session::{AnswerRequest, SessionResponse, SubmitScoreRequest},
    },
    error::AppError,
    services::quiz_service,
    state::SharedState,
};

/// Session endpoints: the three player commands plus "play again".
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/session", get(get_session))
        .route("/session/start", post(start_session))
        .route("/session/answer", post(select_answer))
        .route("/session/submit", post(submit_score))
        .route("/session/play-again", post(play_again))
}

#[utoipa::path(
    get,
    path = "/session",
    tag = "session",
    responses((status = 200, description = "Current session state", body = SessionResponse))
)]
/// Return the current session snapshot. The correct option stays hidden until the question is resolved.
pub async fn get_session(State(state): State<SharedState>) -> Json<SessionResponse> {
    Json(quiz_service::current_session(&state))
}

#[utoipa::path(
    post,
    path = "/session/start",
    tag = "session",
    responses(
        (status = 202, description = "Questions are loading", body = SessionResponse),
        (status = 409, description = "Session already started")
    )
)]
/// Start the idle session.
pub async fn start_session(
    State(state): State<SharedState>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let session = quiz_service::start(&state).await?;
    Ok((StatusCode::ACCEPTED, Json(session)))
}

#[utoipa::path(
    post,
    path = "/session/answer",
    tag = "session",
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Answer locked in", body = SessionResponse),
        (status = 400, description = "Option index out of range"),
        (status = 409, description = "No question is waiting for an answer")
    )
)]
/// Lock in an answer for the current question.
pub async fn select_answer(
    State(state): State<SharedState>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = quiz_service::select_answer(&state, payload.index).await?;
    Ok(Json(session))
}

#[utoipa::path(
    post,
    path = "/session/submit",
    tag = "session",
    request_body = SubmitScoreRequest,
    responses(
        (status = 201, description = "Result added to the leaderboard", body = LeaderboardEntryDto),
        (status = 400, description = "Invalid display name"),
        (status = 409, description = "Session not finished or already submitted"),
        (status = 503, description = "Store write failed; retry is allowed")
    )
)]
/// Submit the finished session's score.
pub async fn submit_score(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<SubmitScoreRequest>>,
) -> Result<(StatusCode, Json<LeaderboardEntryDto>), AppError> {
    let entry = quiz_service::submit(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[utoipa::path(
    post,
    path = "/session/play-again",
    tag = "session",
    responses((status = 202, description = "Previous session discarded; questions are loading", body = SessionResponse))
)]
/// Discard the current session and start a new one.
pub async fn play_again(
    State(state): State<SharedState>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let session = quiz_service::play_again(&state).await?;
    Ok((StatusCode::ACCEPTED, Json(session)))
}
