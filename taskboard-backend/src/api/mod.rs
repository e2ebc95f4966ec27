use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use taskboard_core::store::ValidationError;
use taskboard_core::sync::SyncError;

mod board;
mod events;
mod session;

use crate::sessions::SessionError;
use crate::state::AppState;

/// Axum REST API routes. Every board route acts on the caller's own board
/// (see `auth::CurrentUser`).
///
///   POST   /session                 -> sign in: load or create the board
///   GET    /session                 -> sync state, revision, last write
///   DELETE /session                 -> sign out, flushing the pending write
///   POST   /session/retry           -> retry a failed load
///   GET    /board                   -> current snapshot
///   POST   /board/commands          -> apply one BoardCommand
///   POST   /board/drag              -> apply one completed drag gesture
///   GET    /board/selection         -> open task view
///   PUT    /board/selection         -> open a task
///   DELETE /board/selection         -> close the open task
///   POST   /board/selection/edits   -> commit one field edit on the open task
///   GET    /events                  -> SSE stream of the caller's events
///   GET    /status                  -> health check
///   GET    /logs                    -> recent backend log entries
///   GET    /logs/stream             -> SSE of new backend log entries
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route(
            "/session",
            post(session::sign_in)
                .get(session::get_status)
                .delete(session::sign_out),
        )
        .route("/session/retry", post(session::retry))
        .route("/board", get(board::get_board))
        .route("/board/commands", post(board::apply_command))
        .route("/board/drag", post(board::apply_drag))
        .route(
            "/board/selection",
            get(board::get_selection)
                .put(board::open_selection)
                .delete(board::close_selection),
        )
        .route("/board/selection/edits", post(board::edit_selection))
        .route("/events", get(events::sse_events))
        .route("/status", get(events::status))
        .route("/logs", get(events::list_logs))
        .route("/logs/stream", get(events::stream_logs))
}

// ── Shared types and helpers used across sub-modules ────────────────────

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn log_api_issue(status: StatusCode, target: &'static str, message: impl AsRef<str>) {
    let message = message.as_ref();
    if status.is_server_error() {
        log::error!(target: target, "{}", message);
    } else {
        log::warn!(target: target, "{}", message);
    }
}

fn api_error(status: StatusCode, target: &'static str, error: impl ToString) -> ApiError {
    let error = error.to_string();
    log_api_issue(status, target, &error);
    (status, Json(ErrorResponse { error }))
}

fn session_error(target: &'static str, e: SessionError) -> ApiError {
    let status = match &e {
        SessionError::NotSignedIn(_) => StatusCode::NOT_FOUND,
        SessionError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        SessionError::Sync(SyncError::NotRetryable(_)) => StatusCode::CONFLICT,
        SessionError::Sync(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    api_error(status, target, e)
}

fn validation_error(target: &'static str, e: ValidationError) -> ApiError {
    api_error(StatusCode::UNPROCESSABLE_ENTITY, target, e)
}
