//! Authentication Middleware
//! Mission: protect API endpoints with JWT validation

use crate::auth::jwt::JwtHandler;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

/// Auth middleware that validates bearer tokens.
///
/// The credential transport is the `Authorization: Bearer <token>` header,
/// and only that header. On success the token's claims are inserted into the
/// request extensions for handlers to extract.
pub async fn auth_middleware(
    State(jwt_handler): State<Arc<JwtHandler>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or_else(|| {
            warn!("Rejected request without bearer token: {}", req.uri().path());
            AuthError::MissingToken
        })?;

    let claims = jwt_handler.validate_token(token).map_err(|e| {
        warn!("Rejected request with bad token: {:#}", e);
        AuthError::InvalidToken
    })?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Auth rejection reasons.
///
/// The variants exist for logging; the caller sees the same 401 response
/// either way.
#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Unauthorized" })),
        )
            .into_response()
    }
}
