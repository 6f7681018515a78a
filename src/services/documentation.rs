use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the quiz backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::session::get_session,
        crate::routes::session::start_session,
        crate::routes::session::select_answer,
        crate::routes::session::submit_score,
        crate::routes::session::play_again,
        crate::routes::leaderboard::get_leaderboard,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::SessionResponse,
            crate::dto::session::SessionPhaseDto,
            crate::dto::session::SelectionDto,
            crate::dto::session::QuestionView,
            crate::dto::session::AnswerRequest,
            crate::dto::session::SubmitScoreRequest,
            crate::dto::leaderboard::LeaderboardEntryDto,
            crate::dto::leaderboard::LeaderboardResponse,
            crate::dto::sse::SystemStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "session", description = "Quiz session commands and state"),
        (name = "leaderboard", description = "Ranked results"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
