//! HTTP surface of the storefront.

mod auth;
mod extract;
mod middleware;
mod orders;

pub use extract::{AuthUser, ValidatedJson};

use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/signup", post(auth::signup))
        .route("/verify-token", post(auth::verify_token))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout))
        .route("/orders", post(orders::place_order).get(orders::list_orders))
        .layer(axum_middleware::from_fn(middleware::request_logger))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({"ok": true}))
}
