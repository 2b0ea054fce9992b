//! Request extractors

use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Header the upstream auth gateway sets to the authenticated user's id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the operator API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// The authenticated caller.
///
/// Rejects with 401 when the header is missing or not a UUID.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .map(CurrentUser)
            .ok_or_else(|| ApiError::Unauthorized("Missing or invalid x-user-id header".into()))
    }
}

/// A trusted service or operator, identified by `x-api-key`.
///
/// Guards the internal and operator endpoints. Rejects with 403 while no
/// key is configured and 401 for a missing or wrong key.
#[derive(Debug, Clone, Copy)]
pub struct Operator;

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Operator {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.operator_api_key.as_deref() else {
            return Err(ApiError::Forbidden(
                "Operator endpoints are disabled; set OPERATOR_API_KEY".into(),
            ));
        };

        let presented = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty());

        match presented {
            Some(key) if constant_time_compare(key, expected) => Ok(Operator),
            _ => Err(ApiError::Unauthorized(
                "Missing or invalid x-api-key header".into(),
            )),
        }
    }
}

/// Constant-time string comparison to prevent timing attacks
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
