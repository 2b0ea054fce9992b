//! Karma routes

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use common::levels::LevelThreshold;
use common::models::{KarmaEntry, KarmaSource, LeaderboardEntry, Timeframe, UserKarmaProfile};
use processor::{AppendOutcome, Engagement, ReconcileStats};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::{CurrentUser, Operator};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct HistoryQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct LeaderboardQuery {
    /// "all", "monthly", "weekly" or "daily"
    timeframe: Option<String>,
    limit: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendRequest {
    user_id: Uuid,
    amount: i64,
    source: KarmaSource,
    description: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementRequest {
    user_id: Uuid,
    engagement: Engagement,
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<UserKarmaProfile>> {
    Ok(Json(state.ledger.profile(user_id).await?))
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<KarmaEntry>>> {
    let Query(query) = query?;
    let entries = state
        .ledger
        .history(user_id, query.limit, query.offset)
        .await?;
    Ok(Json(entries))
}

pub async fn leaderboard(
    State(state): State<Arc<AppState>>,
    query: Result<Query<LeaderboardQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<LeaderboardEntry>>> {
    let Query(query) = query?;
    let timeframe = match query.timeframe.as_deref() {
        Some(t) => t.parse::<Timeframe>()?,
        None => Timeframe::default(),
    };
    let entries = state.leaderboard.rank(timeframe, query.limit).await?;
    Ok(Json(entries))
}

pub async fn levels(State(state): State<Arc<AppState>>) -> Json<Vec<LevelThreshold>> {
    Json(state.levels.thresholds().to_vec())
}

pub async fn user_profile(
    State(state): State<Arc<AppState>>,
    user_id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<UserKarmaProfile>> {
    let Path(user_id) = user_id?;
    Ok(Json(state.ledger.profile(user_id).await?))
}

pub async fn append(
    State(state): State<Arc<AppState>>,
    _operator: Operator,
    body: Result<Json<AppendRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AppendOutcome>)> {
    let Json(req) = body?;
    let outcome = state
        .ledger
        .append(req.user_id, req.amount, req.source, &req.description)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn engagement(
    State(state): State<Arc<AppState>>,
    _operator: Operator,
    body: Result<Json<EngagementRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AppendOutcome>)> {
    let Json(req) = body?;
    let outcome = state.ledger.record(req.user_id, &req.engagement).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn reconcile(
    State(state): State<Arc<AppState>>,
    _operator: Operator,
) -> ApiResult<Json<ReconcileStats>> {
    info!("Manual reconcile triggered");
    Ok(Json(state.reconciler.sweep().await?))
}
