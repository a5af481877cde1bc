use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::account::Candidate;
use crate::error::{Result, ServerError};

const CHECK_INBOX: &str =
    "Account created. Check your inbox to activate it.";

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub message: String,
}

/// Handler to register a new account.
pub async fn handler(
    State(state): State<AppState>,
    body: std::result::Result<Json<Candidate>, JsonRejection>,
) -> Result<(StatusCode, Json<Response>)> {
    let Json(candidate) = body?;

    let result = state.accounts.register(candidate).await?;
    if !result.is_empty() {
        return Err(ServerError::Validation(result.into()));
    }

    Ok((
        StatusCode::CREATED,
        Json(Response {
            message: CHECK_INBOX.to_owned(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;

    use crate::account::{AccountStatus, MemoryUserStore, UserStore};
    use crate::*;

    #[tokio::test]
    async fn test_register_handler() {
        let store = Arc::new(MemoryUserStore::new());
        let app = app(router::state(Arc::clone(&store)));

        let body = json!({
            "username": "alice",
            "password": "pw123",
            "email": "a@x.com",
        });
        let response =
            make_request(app, Method::POST, "/register", body.to_string())
                .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let alice = store.select_by_username("alice").await.unwrap().unwrap();
        assert_eq!(alice.status, AccountStatus::Pending);
        assert_eq!(alice.email, "a@x.com");
    }

    #[tokio::test]
    async fn test_register_missing_password() {
        let store = Arc::new(MemoryUserStore::new());
        let app = app(router::state(Arc::clone(&store)));

        let body = json!({ "username": "alice", "email": "a@x.com" });
        let response =
            make_request(app, Method::POST, "/register", body.to_string())
                .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["errors"][0]["field"], "passwordMsg");
        assert_eq!(body["errors"][0]["message"], "password required");
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_register_twice() {
        let store = Arc::new(MemoryUserStore::new());
        let state = router::state(Arc::clone(&store));

        let body = json!({
            "username": "alice",
            "password": "pw123",
            "email": "a@x.com",
        })
        .to_string();
        let response =
            make_request(app(state.clone()), Method::POST, "/register", body.clone())
                .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response =
            make_request(app(state), Method::POST, "/register", body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["errors"][0]["message"], "account already exists");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_register_malformed_body() {
        let app = app(router::state(Arc::new(MemoryUserStore::new())));

        let response =
            make_request(app, Method::POST, "/register", "{".into()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
