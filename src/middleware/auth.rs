use crate::common::callback_token::{self, CallbackClaims};
use crate::common::response::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

/// Verifies the per-job bearer token a worker presents on status callbacks
/// and exposes its claims to the handler.
pub async fn callback_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = authorize_callback(&state.config.callback_secret, req.headers())?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

pub fn authorize_callback(secret: &str, headers: &HeaderMap) -> Result<CallbackClaims, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|auth_header| auth_header.to_str().ok())
        .and_then(|auth_value| auth_value.strip_prefix("Bearer "));

    let token = match token {
        Some(t) => t,
        None => return Err(ApiError("Unauthorized: Missing or invalid token".to_string(), StatusCode::UNAUTHORIZED)),
    };

    callback_token::verify(secret, token)
        .map_err(|_| ApiError("Unauthorized: Invalid callback token".to_string(), StatusCode::UNAUTHORIZED))
}
