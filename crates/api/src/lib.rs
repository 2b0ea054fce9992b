//! Karma service HTTP API

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

pub use state::AppState;

/// Build the full router with CORS and request tracing
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/social/users", post(routes::users::upsert))
        // Karma
        .route("/social/karma/me", get(routes::karma::me))
        .route("/social/karma/me/history", get(routes::karma::history))
        .route("/social/karma/leaderboard", get(routes::karma::leaderboard))
        .route("/social/karma/levels", get(routes::karma::levels))
        .route("/social/karma/users/:user_id", get(routes::karma::user_profile))
        .route("/social/karma/entries", post(routes::karma::append))
        .route("/social/karma/engagements", post(routes::karma::engagement))
        .route("/social/karma/reconcile", post(routes::karma::reconcile))
        .route("/social/karma/events", get(routes::events::stream))
        // Badges
        .route(
            "/social/badges",
            get(routes::badges::list).post(routes::badges::create),
        )
        .route("/social/badges/me/progress", get(routes::badges::my_progress))
        .route(
            "/social/badges/category/:category",
            get(routes::badges::by_category),
        )
        .route("/social/badges/rarity/:rarity", get(routes::badges::by_rarity))
        .route("/social/badges/:badge_id", get(routes::badges::get))
        .route(
            "/social/badges/:badge_id/deactivate",
            post(routes::badges::deactivate),
        )
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
