//! HTTP routing configuration

use axum::{
    middleware::from_fn,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{handlers, middlewares, state};

/// Creates the Axum router with all routes configured.
pub fn app(state: state::AppState) -> Router {
    let auth = from_fn(middlewares::auth_middlewares::api_key_auth);

    Router::new()
        // Health check endpoints (no auth required)
        .route("/health", get(handlers::health_handlers::health))
        .route("/ready", get(handlers::health_handlers::ready))
        // API endpoints
        .route(
            "/v1/notifications",
            post(handlers::notification_handlers::create_notification).layer(auth.clone()),
        )
        .route(
            "/v1/notifications/{id}",
            get(handlers::notification_handlers::get_notification).layer(auth.clone()),
        )
        .route(
            "/v1/notifications/{id}",
            delete(handlers::notification_handlers::cancel_notification).layer(auth.clone()),
        )
        .route(
            "/v1/notifications/{id}",
            patch(handlers::notification_handlers::reschedule_notification).layer(auth),
        )
        // Dispatch facility callback (payload is untrusted, no API key)
        .route(
            "/v1/callbacks/delivery",
            post(handlers::callback_handlers::handle_delivery),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
