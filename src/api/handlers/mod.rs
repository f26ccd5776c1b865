//! Route handlers and the HTTP rendering of [`AuthError`].
//!
//! Every failure leaves the service as `{"error": <code>, "message": <text>}`.
//! Storage details are logged, never returned.

pub mod health;
pub mod login;
pub mod me;
pub mod password;
pub mod principal;
pub mod register;
pub mod root;

use axum::{
    extract::rejection::JsonRejection,
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::credentials::AuthError;

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl ErrorBody {
    fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
        }
    }
}

const fn status_for(err: &AuthError) -> StatusCode {
    match err {
        AuthError::DuplicateIdentity => StatusCode::CONFLICT,
        AuthError::InvalidCredentials
        | AuthError::NotFound
        | AuthError::Expired
        | AuthError::NotYetValid
        | AuthError::BadSignature
        | AuthError::Malformed => StatusCode::UNAUTHORIZED,
        AuthError::WeakPassword(_) | AuthError::InvalidIdentity => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        let message = match &self {
            Self::Internal(detail) => {
                error!("internal error: {detail}");
                "internal error".to_string()
            }
            Self::NotFound => AuthError::InvalidCredentials.to_string(),
            other => other.to_string(),
        };
        let body = Json(ErrorBody::new(self.code(), message));

        if status == StatusCode::UNAUTHORIZED {
            let challenge = if self.is_token_error() {
                HeaderValue::from_static("Bearer error=\"invalid_token\"")
            } else {
                HeaderValue::from_static("Bearer")
            };
            (status, [(WWW_AUTHENTICATE, challenge)], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

/// Render an undecodable request body as 400.
pub(crate) fn bad_request(rejection: &JsonRejection) -> Response {
    debug!("rejected request body: {}", rejection.body_text());
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody::new("bad_request", rejection.body_text())),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::PolicyViolation;
    use axum::body::to_bytes;

    async fn render(err: AuthError) -> anyhow::Result<(StatusCode, Option<String>, ErrorBody)> {
        let response = err.into_response();
        let status = response.status();
        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, challenge, serde_json::from_slice(&body)?))
    }

    #[tokio::test]
    async fn status_codes() -> anyhow::Result<()> {
        let cases = [
            (AuthError::DuplicateIdentity, StatusCode::CONFLICT),
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::Expired, StatusCode::UNAUTHORIZED),
            (AuthError::BadSignature, StatusCode::UNAUTHORIZED),
            (AuthError::Malformed, StatusCode::UNAUTHORIZED),
            (
                AuthError::WeakPassword(PolicyViolation::TooShort { min: 8 }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (AuthError::InvalidIdentity, StatusCode::UNPROCESSABLE_ENTITY),
            (
                AuthError::Internal("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let (status, _, _) = render(err).await?;
            assert_eq!(status, expected);
        }
        Ok(())
    }

    #[tokio::test]
    async fn unauthorized_carries_challenge() -> anyhow::Result<()> {
        let (_, challenge, body) = render(AuthError::InvalidCredentials).await?;
        assert_eq!(challenge.as_deref(), Some("Bearer"));
        assert_eq!(body.error, "invalid_credentials");

        let (_, challenge, body) = render(AuthError::Expired).await?;
        assert_eq!(challenge.as_deref(), Some("Bearer error=\"invalid_token\""));
        assert_eq!(body.error, "token_expired");

        let (_, challenge, _) = render(AuthError::DuplicateIdentity).await?;
        assert_eq!(challenge, None);
        Ok(())
    }

    #[tokio::test]
    async fn not_found_looks_like_invalid_credentials() -> anyhow::Result<()> {
        let not_found = render(AuthError::NotFound).await?;
        let invalid = render(AuthError::InvalidCredentials).await?;
        assert_eq!(not_found, invalid);
        Ok(())
    }

    #[tokio::test]
    async fn internal_details_are_hidden() -> anyhow::Result<()> {
        let (_, _, body) = render(AuthError::Internal("pool timed out".to_string())).await?;
        assert_eq!(body.error, "internal_error");
        assert!(!body.message.contains("pool"));
        Ok(())
    }
}
