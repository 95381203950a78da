use axum::{routing::get, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn notifications() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", post(handlers::create_notification))
        .route(
            "/api/notifications/:user_id",
            get(handlers::list_notifications),
        )
}
