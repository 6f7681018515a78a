/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Ranked result reads.
pub mod leaderboard_service;
/// Session commands issued to the quiz engine.
pub mod quiz_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervisor with reconnect backoff.
pub mod storage_supervisor;
