//! Public account lookup.

use axum::Json;
use axum::extract::{Path, State};

use crate::AppState;
use crate::account::Account;
use crate::error::{Result, ServerError};

/// `GET /users/{user_id}`.
pub async fn handler(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Account>> {
    state
        .accounts
        .find_by_id(user_id)
        .await?
        .map(Json)
        .ok_or(ServerError::NotFound)
}
