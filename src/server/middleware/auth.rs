//! Shared-secret bearer authentication for trusted callers (webhook submitters
//! and the worker runtime posting callbacks). This is not end-user auth: it
//! checks one static secret against the `Authorization` header.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

use crate::error::OrchestratorError;

#[derive(Clone)]
pub struct WebhookSecret(pub Arc<String>);

pub async fn bearer_auth_middleware(
    State(secret): State<WebhookSecret>,
    request: Request,
    next: Next,
) -> Response {
    match extract_bearer(&request) {
        Some(token) if token == secret.0.as_str() => next.run(request).await,
        _ => {
            use axum::response::IntoResponse;
            OrchestratorError::Auth.into_response()
        }
    }
}

fn extract_bearer(request: &Request) -> Option<&str> {
    let header = request.headers().get(axum::http::header::AUTHORIZATION)?;
    let value = header.to_str().ok()?;
    value.strip_prefix("Bearer ")
}
