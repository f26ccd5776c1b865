//! Bearer token extraction.

use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::credentials::{AuthError, AuthFlow, User};

/// Read `Authorization: Bearer <token>`. A missing or non-bearer header is `Malformed`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::Malformed)?
        .to_str()
        .map_err(|_| AuthError::Malformed)?;

    let (scheme, token) = value.trim().split_once(' ').ok_or(AuthError::Malformed)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::Malformed);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::Malformed);
    }
    Ok(token)
}

/// Resolve the bearer token to the user it was issued for.
pub async fn require_auth(headers: &HeaderMap, flow: &AuthFlow) -> Result<User, AuthError> {
    let token = bearer_token(headers)?;
    flow.current_user(token).await
}
