//! Password rotation for the token holder.

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

use super::{bad_request, principal::bearer_token, ErrorBody};
use crate::credentials::{AuthFlow, PasswordChange};

#[derive(ToSchema, Deserialize)]
pub struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
    confirm_new_password: Option<String>,
}

impl From<ChangePasswordRequest> for PasswordChange {
    fn from(request: ChangePasswordRequest) -> Self {
        Self {
            current_password: SecretString::from(request.current_password),
            new_password: SecretString::from(request.new_password),
            confirm_new_password: request.confirm_new_password.map(SecretString::from),
        }
    }
}

#[utoipa::path(
    put,
    path = "/users/me/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Undecodable request body", body = ErrorBody),
        (status = 401, description = "Invalid token or current password", body = ErrorBody),
        (status = 422, description = "New password rejected by policy", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
#[instrument(skip(headers, flow, payload))]
pub async fn change_password(
    headers: HeaderMap,
    flow: Extension<Arc<AuthFlow>>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Response {
    // The token is checked before the body is looked at.
    let token = match bearer_token(&headers) {
        Ok(token) => token,
        Err(err) => return err.into_response(),
    };
    if let Err(err) = flow.tokens().validate(token) {
        return err.into_response();
    }

    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(&rejection),
    };

    match flow.change_password(token, request.into()).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}
