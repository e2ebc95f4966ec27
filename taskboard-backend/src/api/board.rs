use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use taskboard_core::reorder::DragEvent;
use taskboard_core::selection::{FieldEdit, TaskView};
use taskboard_core::session::BoardSession;
use taskboard_core::store::BoardCommand;
use taskboard_core::types::Board;

use super::{api_error, session_error, validation_error, ApiError};
use crate::auth::CurrentUser;
use crate::events::BoardEvent;
use crate::sessions::SharedSession;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardResponse {
    pub revision: u64,
    pub board: Board,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeResponse {
    pub changed: bool,
    pub revision: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResponse {
    pub task_id: Option<String>,
    pub view: Option<TaskView>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenTaskBody {
    pub task_id: String,
}

async fn live_session(
    state: &AppState,
    user_id: &str,
    target: &'static str,
) -> Result<SharedSession, ApiError> {
    state
        .sessions
        .session(user_id)
        .await
        .map_err(|e| session_error(target, e))
}

/// Announce a change to the user's event stream.
fn changed(state: &AppState, session: &BoardSession, changed: bool) -> Json<ChangeResponse> {
    let revision = session.revision();
    if changed {
        let _ = state.event_tx.send(BoardEvent::BoardChanged {
            user_id: session.user_id().to_string(),
            revision,
        });
    }
    Json(ChangeResponse { changed, revision })
}

fn selection_of(session: &BoardSession) -> SelectionResponse {
    SelectionResponse {
        task_id: session.selection().open_task_id().map(str::to_string),
        view: session.open_task_view(Utc::now().date_naive()),
    }
}

pub async fn get_board(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<BoardResponse>, ApiError> {
    let session = live_session(&state, &user_id, "taskboard.api.get_board").await?;
    let session = session.lock().await;
    Ok(Json(BoardResponse {
        revision: session.revision(),
        board: session.board().clone(),
    }))
}

/// POST /board/commands -- apply one command. Unknown ids are accepted as
/// no-ops (`changed: false`); blank or malformed input is rejected with 422.
pub async fn apply_command(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(command): Json<BoardCommand>,
) -> Result<Json<ChangeResponse>, ApiError> {
    let session = live_session(&state, &user_id, "taskboard.api.apply_command").await?;
    let mut session = session.lock().await;
    let applied = session
        .dispatch(&command)
        .map_err(|e| validation_error("taskboard.api.apply_command", e))?;
    Ok(changed(&state, &session, applied))
}

pub async fn apply_drag(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(event): Json<DragEvent>,
) -> Result<Json<ChangeResponse>, ApiError> {
    let session = live_session(&state, &user_id, "taskboard.api.apply_drag").await?;
    let mut session = session.lock().await;
    let applied = session.handle_drag(&event);
    Ok(changed(&state, &session, applied))
}

pub async fn get_selection(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<SelectionResponse>, ApiError> {
    let session = live_session(&state, &user_id, "taskboard.api.get_selection").await?;
    let session = session.lock().await;
    Ok(Json(selection_of(&session)))
}

pub async fn open_selection(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<OpenTaskBody>,
) -> Result<Json<SelectionResponse>, ApiError> {
    let target = "taskboard.api.open_selection";
    let session = live_session(&state, &user_id, target).await?;
    let mut session = session.lock().await;
    if !session.open_task(&body.task_id) {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            target,
            format!("Task not found: {}", body.task_id),
        ));
    }
    Ok(Json(selection_of(&session)))
}

pub async fn close_selection(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<StatusCode, ApiError> {
    let session = live_session(&state, &user_id, "taskboard.api.close_selection").await?;
    session.lock().await.close_task();
    Ok(StatusCode::NO_CONTENT)
}

/// POST /board/selection/edits -- commit one field of the open task. With no
/// task open this changes nothing.
pub async fn edit_selection(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(edit): Json<FieldEdit>,
) -> Result<Json<ChangeResponse>, ApiError> {
    let session = live_session(&state, &user_id, "taskboard.api.edit_selection").await?;
    let mut session = session.lock().await;
    let applied = session
        .edit_open_task(edit)
        .map_err(|e| validation_error("taskboard.api.edit_selection", e))?;
    Ok(changed(&state, &session, applied))
}

#[cfg(test)]
mod tests {
    use crate::api::testing::{call, test_app};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_board_requires_session() {
        let (_docs, _state, app) = test_app();
        let (status, body) = call(&app, "GET", "/board", Some("u1"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("u1"));
    }

    #[tokio::test]
    async fn test_commands_and_drag() {
        let (_docs, state, app) = test_app();
        let mut events = state.event_tx.subscribe();
        call(&app, "POST", "/session", Some("u1"), None).await;
        while events.try_recv().is_ok() {}

        let (status, body) = call(&app, "GET", "/board", Some("u1"), None).await;
        assert_eq!(status, StatusCode::OK);
        let order: Vec<String> =
            serde_json::from_value(body["board"]["columnOrder"].clone()).unwrap();
        assert_eq!(order.len(), 3);

        let (status, body) = call(
            &app,
            "POST",
            "/board/commands",
            Some("u1"),
            Some(json!({ "type": "addTask", "columnId": order[0], "id": "t1", "title": "Brief" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "changed": true, "revision": 1 }));
        let event = serde_json::to_value(events.try_recv().unwrap()).unwrap();
        assert_eq!(event["type"], "boardChanged");
        assert_eq!(event["revision"], 1);

        let (status, body) = call(
            &app,
            "POST",
            "/board/commands",
            Some("u1"),
            Some(json!({ "type": "addTask", "columnId": order[0], "title": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "Task title cannot be blank");

        let (_, body) = call(
            &app,
            "POST",
            "/board/commands",
            Some("u1"),
            Some(json!({ "type": "deleteTask", "taskId": "missing" })),
        )
        .await;
        assert_eq!(body, json!({ "changed": false, "revision": 1 }));

        let drag = json!({
            "kind": "task",
            "entityId": "t1",
            "source": { "containerId": order[0], "index": 0 },
            "destination": { "containerId": order[2], "index": 0 },
        });
        let (_, body) = call(&app, "POST", "/board/drag", Some("u1"), Some(drag)).await;
        assert_eq!(body, json!({ "changed": true, "revision": 2 }));

        let cancelled = json!({
            "kind": "column",
            "entityId": order[0],
            "source": { "containerId": "board", "index": 0 },
        });
        let (_, body) = call(&app, "POST", "/board/drag", Some("u1"), Some(cancelled)).await;
        assert_eq!(body, json!({ "changed": false, "revision": 2 }));

        let (_, body) = call(&app, "GET", "/board", Some("u1"), None).await;
        assert_eq!(body["board"]["columns"][order[2].as_str()]["taskIds"], json!(["t1"]));
    }

    #[tokio::test]
    async fn test_selection_flow() {
        let (_docs, _state, app) = test_app();
        call(&app, "POST", "/session", Some("u1"), None).await;
        let (_, body) = call(&app, "GET", "/board", Some("u1"), None).await;
        let todo = body["board"]["columnOrder"][0].as_str().unwrap().to_string();
        call(
            &app,
            "POST",
            "/board/commands",
            Some("u1"),
            Some(json!({ "type": "addTask", "columnId": todo, "id": "t1", "title": "Script" })),
        )
        .await;

        let (status, _) = call(
            &app,
            "PUT",
            "/board/selection",
            Some("u1"),
            Some(json!({ "taskId": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(
            &app,
            "PUT",
            "/board/selection",
            Some("u1"),
            Some(json!({ "taskId": "t1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["taskId"], "t1");
        assert_eq!(body["view"]["columnTitle"], "To Do");

        let (_, body) = call(
            &app,
            "POST",
            "/board/selection/edits",
            Some("u1"),
            Some(json!({ "field": "title", "value": "Final script" })),
        )
        .await;
        assert_eq!(body["changed"], true);

        let (_, body) = call(&app, "GET", "/board/selection", Some("u1"), None).await;
        assert_eq!(body["view"]["task"]["title"], "Final script");

        call(
            &app,
            "POST",
            "/board/commands",
            Some("u1"),
            Some(json!({ "type": "deleteTask", "taskId": "t1" })),
        )
        .await;
        let (_, body) = call(&app, "GET", "/board/selection", Some("u1"), None).await;
        assert_eq!(body["taskId"], serde_json::Value::Null);
        assert_eq!(body["view"], serde_json::Value::Null);

        let (status, _) = call(&app, "DELETE", "/board/selection", Some("u1"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, body) = call(
            &app,
            "POST",
            "/board/selection/edits",
            Some("u1"),
            Some(json!({ "field": "title", "value": "x" })),
        )
        .await;
        assert_eq!(body["changed"], false);
    }
}
