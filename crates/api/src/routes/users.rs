//! User routes

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use common::models::User;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::extract::Operator;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertUser {
    username: String,
    avatar_url: Option<String>,
}

/// Create a user, or refresh the avatar of an existing one
pub async fn upsert(
    State(state): State<Arc<AppState>>,
    _operator: Operator,
    body: Result<Json<UpsertUser>, JsonRejection>,
) -> ApiResult<Json<User>> {
    let Json(req) = body?;
    let username = req.username.trim();
    if username.is_empty() || username.len() > 64 {
        return Err(ApiError::Validation(
            "username must be 1-64 characters".to_string(),
        ));
    }

    let user = state
        .store
        .upsert_user(username, req.avatar_url.as_deref())
        .await?;
    debug!("Upserted user {} ({})", user.username, user.id);
    Ok(Json(user))
}
