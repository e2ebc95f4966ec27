/// Request identity. The user id comes from the `X-User-Id` header, or the
/// `user` query parameter for clients that cannot set headers (EventSource).
use axum::{
    extract::{FromRequestParts, Query},
    http::{request::Parts, StatusCode},
    Json,
};
use serde::Deserialize;

use crate::api::{log_api_issue, ErrorResponse};

pub const USER_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

#[derive(Deserialize)]
struct UserQuery {
    user: Option<String>,
}

fn header_user(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn query_user(parts: &Parts) -> Option<String> {
    Query::<UserQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(q)| q.user)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match header_user(parts).or_else(|| query_user(parts)) {
            Some(user_id) => Ok(CurrentUser(user_id)),
            None => {
                let status = StatusCode::UNAUTHORIZED;
                log_api_issue(
                    status,
                    "taskboard.api.auth",
                    format!("Missing user for {} {}", parts.method, parts.uri.path()),
                );
                Err((
                    status,
                    Json(ErrorResponse {
                        error: "Not signed in".to_string(),
                    }),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Option<String> {
        let (mut parts, _) = request.into_parts();
        CurrentUser::from_request_parts(&mut parts, &())
            .await
            .ok()
            .map(|CurrentUser(id)| id)
    }

    #[tokio::test]
    async fn test_header_wins_over_query() {
        let request = Request::builder()
            .uri("/events?user=from-query")
            .header("X-User-Id", "from-header")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.as_deref(), Some("from-header"));
    }

    #[tokio::test]
    async fn test_query_fallback_and_missing() {
        let request = Request::builder().uri("/events?user=u7").body(()).unwrap();
        assert_eq!(extract(request).await.as_deref(), Some("u7"));

        let request = Request::builder()
            .uri("/board")
            .header("X-User-Id", "  ")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await, None);
    }
}
