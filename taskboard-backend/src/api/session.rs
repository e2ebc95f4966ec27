use axum::{extract::State, http::StatusCode, Json};

use super::{session_error, ApiError};
use crate::auth::CurrentUser;
use crate::sessions::SessionStatus;
use crate::state::AppState;

/// POST /session -- load the caller's board, creating a seeded one if none
/// exists.
pub async fn sign_in(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<SessionStatus>, ApiError> {
    state
        .sessions
        .sign_in(&user_id)
        .await
        .map(Json)
        .map_err(|e| session_error("taskboard.api.sign_in", e))
}

pub async fn get_status(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<SessionStatus>, ApiError> {
    state
        .sessions
        .status(&user_id)
        .await
        .map(Json)
        .map_err(|e| session_error("taskboard.api.session_status", e))
}

/// POST /session/retry -- only meaningful after a failed load.
pub async fn retry(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<SessionStatus>, ApiError> {
    state
        .sessions
        .retry(&user_id)
        .await
        .map(Json)
        .map_err(|e| session_error("taskboard.api.retry", e))
}

pub async fn sign_out(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> StatusCode {
    if state.sessions.sign_out(&user_id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
