//! Authentication middleware for textsense-ta
//!
//! Verifies `Authorization: Bearer <token>` through the configured
//! [`Authenticator`](textsense_common::auth::Authenticator) and stores the
//! verified [`Principal`] in request extensions for handlers.
//!
//! **Note:** Applied to /text routes only. /health does NOT use this middleware.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use textsense_common::auth::{parse_bearer, AuthError, Principal};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::AppState;

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // Disabled auth accepts requests with or without a header
    if !state.authenticator.is_enforcing() {
        let principal = state.authenticator.verify("").await?;
        request.extensions_mut().insert(principal);
        return Ok(next.run(request).await);
    }

    let token = {
        let header = request
            .headers()
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingCredentials)?
            .to_str()
            .map_err(|_| AuthError::MalformedHeader)?;
        parse_bearer(header)?.to_string()
    };

    let principal: Principal = state.authenticator.verify(&token).await.map_err(|e| {
        warn!(error = %e, path = %request.uri().path(), "Authentication failed");
        e
    })?;

    debug!(principal = %principal, "Request authenticated");
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
