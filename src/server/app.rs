//! Application setup and router assembly.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::notifier::Notifier;
use crate::server::middleware::{bearer_auth_middleware, WebhookSecret};
use crate::server::routes::{events_handler, health_handler, status_handler, webhook_handler};
use crate::store::Store;

/// Shared application state threaded through every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub notifier: Arc<Notifier>,
    pub http_client: reqwest::Client,
}

pub fn build_app(state: AppState, webhook_secret: String) -> Router {
    let secret = WebhookSecret(Arc::new(webhook_secret));

    let authenticated = Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/jobs/:id/events", post(events_handler))
        .route_layer(middleware::from_fn_with_state(secret, bearer_auth_middleware))
        .with_state(state.clone());

    let public = Router::new()
        .route("/jobs/:id/status", get(status_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    Router::new()
        .merge(authenticated)
        .merge(public)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
