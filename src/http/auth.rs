//! JWT bearer-auth middleware for the inter-server API.

use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

use crate::services::Services;
use crate::utils::validate_jwt;

/// Rejects any request whose `Authorization: Bearer <JWT>` header is
/// missing, malformed, or fails to validate against the cluster secret.
pub async fn require_cluster_jwt(
    State(services): State<Arc<Services>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    validate_jwt(token, &services.cluster_secret)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    Ok(next.run(req).await)
}
