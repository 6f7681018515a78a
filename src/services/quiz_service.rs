//! Service helpers driving the quiz session engine on behalf of HTTP clients.

use crate::{
    dto::{
        leaderboard::LeaderboardEntryDto,
        session::{SessionResponse, SubmitScoreRequest},
    },
    error::ServiceError,
    services::sse_events,
    state::{
        SharedState,
        engine::{SelectOutcome, StartOutcome, SubmitOutcome, SubmitRejection},
    },
};

/// Return the latest session snapshot.
pub fn current_session(state: &SharedState) -> SessionResponse {
    SessionResponse::from(&state.engine().snapshot())
}

/// Start the idle session.
pub async fn start(state: &SharedState) -> Result<SessionResponse, ServiceError> {
    match state.engine().start().await? {
        StartOutcome::Started => Ok(current_session(state)),
        StartOutcome::AlreadyStarted => Err(ServiceError::InvalidState(
            "session already started; use play-again for a new round".into(),
        )),
    }
}

/// Discard the current session and start a new one.
pub async fn play_again(state: &SharedState) -> Result<SessionResponse, ServiceError> {
    state.engine().play_again().await?;
    Ok(current_session(state))
}

/// Lock in an answer for the current question.
pub async fn select_answer(
    state: &SharedState,
    index: usize,
) -> Result<SessionResponse, ServiceError> {
    match state.engine().select_answer(index).await? {
        SelectOutcome::Accepted => Ok(current_session(state)),
        SelectOutcome::Ignored => Err(ServiceError::InvalidState(
            "no question is waiting for an answer".into(),
        )),
        SelectOutcome::OutOfRange => Err(ServiceError::InvalidInput(format!(
            "option {index} does not exist for the current question"
        ))),
    }
}

/// Submit the finished session's score and announce the new entry.
pub async fn submit(
    state: &SharedState,
    request: SubmitScoreRequest,
) -> Result<LeaderboardEntryDto, ServiceError> {
    match state.engine().submit(request.name).await? {
        SubmitOutcome::Submitted(entry) => {
            let dto = LeaderboardEntryDto::from(&entry);
            sse_events::broadcast_leaderboard_entry(state, &dto);
            Ok(dto)
        }
        SubmitOutcome::Failed(message) => Err(ServiceError::SubmissionFailed(message)),
        SubmitOutcome::Rejected(rejection) => {
            let message = match rejection {
                SubmitRejection::NotFinished => "session is not finished",
                SubmitRejection::AlreadySubmitted => "result already submitted",
                SubmitRejection::InFlight => "a submission is already in progress",
            };
            Err(ServiceError::InvalidState(message.into()))
        }
    }
}
