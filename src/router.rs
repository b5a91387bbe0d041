//! HTTP router assembly.

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::admin::admin_routes;
use crate::ai::routes::ai_routes;
use crate::auth::auth_routes;
use crate::documents::document_routes;
use crate::foxit::routes::foxit_routes;
use crate::onboarding::onboarding_routes;
use crate::state::AppState;

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "onboardiq",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Build the full application router.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(auth_routes())
        .merge(onboarding_routes())
        .merge(document_routes())
        .merge(foxit_routes())
        .merge(ai_routes())
        .merge(admin_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
