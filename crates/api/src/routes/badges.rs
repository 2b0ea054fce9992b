//! Badge catalog routes

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use common::models::{Badge, BadgeCategory, BadgeCriterion, BadgeProgress, BadgeRarity};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::extract::{CurrentUser, Operator};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBadge {
    badge_id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
    #[serde(default)]
    color: String,
    category: BadgeCategory,
    rarity: BadgeRarity,
    #[serde(default)]
    karma_reward: i64,
    criterion: BadgeCriterion,
}

impl From<CreateBadge> for Badge {
    fn from(req: CreateBadge) -> Self {
        Badge {
            badge_id: req.badge_id,
            name: req.name,
            description: req.description,
            icon: req.icon,
            color: req.color,
            category: req.category,
            rarity: req.rarity,
            karma_reward: req.karma_reward,
            active: true,
            criterion: req.criterion,
        }
    }
}

pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Badge>>> {
    Ok(Json(state.catalog.list().await?))
}

pub async fn by_category(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
) -> ApiResult<Json<Vec<Badge>>> {
    let category: BadgeCategory = category.parse()?;
    Ok(Json(state.catalog.by_category(category).await?))
}

pub async fn by_rarity(
    State(state): State<Arc<AppState>>,
    Path(rarity): Path<String>,
) -> ApiResult<Json<Vec<Badge>>> {
    let rarity: BadgeRarity = rarity.parse()?;
    Ok(Json(state.catalog.by_rarity(rarity).await?))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(badge_id): Path<String>,
) -> ApiResult<Json<Badge>> {
    Ok(Json(state.catalog.get(&badge_id).await?))
}

pub async fn my_progress(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<Vec<BadgeProgress>>> {
    Ok(Json(state.evaluator.progress(user_id).await?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    _operator: Operator,
    body: Result<Json<CreateBadge>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Badge>)> {
    let Json(req) = body?;
    let badge = state.catalog.create(req.into()).await?;
    Ok((StatusCode::CREATED, Json(badge)))
}

pub async fn deactivate(
    State(state): State<Arc<AppState>>,
    _operator: Operator,
    Path(badge_id): Path<String>,
) -> ApiResult<Json<Badge>> {
    Ok(Json(state.catalog.deactivate(&badge_id).await?))
}
