use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::account::ActivationOutcome;
use crate::error::Result;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub outcome: ActivationOutcome,
}

/// Handler for links mailed on registration.
pub async fn handler(
    State(state): State<AppState>,
    Path((user_id, code)): Path<(i64, String)>,
) -> Result<(StatusCode, Json<Response>)> {
    let outcome = state.accounts.activate(user_id, &code).await?;

    let status = match outcome {
        ActivationOutcome::Success | ActivationOutcome::AlreadyActive => {
            StatusCode::OK
        },
        ActivationOutcome::Failure => StatusCode::BAD_REQUEST,
        ActivationOutcome::NotFound => StatusCode::NOT_FOUND,
    };

    Ok((status, Json(Response { outcome })))
}
