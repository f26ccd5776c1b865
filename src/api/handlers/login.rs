use axum::{
    extract::{rejection::JsonRejection, Extension},
    response::{IntoResponse, Json, Response},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

use super::{bad_request, ErrorBody};
use crate::credentials::AuthFlow;

#[derive(ToSchema, Deserialize)]
pub struct LoginRequest {
    identity: String,
    password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    /// Unix seconds.
    pub expires_at: i64,
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials accepted, bearer token issued", body = LoginResponse),
        (status = 400, description = "Undecodable request body", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip(flow, payload))]
pub async fn login(
    flow: Extension<Arc<AuthFlow>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(&rejection),
    };

    let password = SecretString::from(request.password);
    match flow.login(&request.identity, &password).await {
        Ok(token) => {
            let expires_at = token.expires_at();
            Json(LoginResponse {
                token: token.into_string(),
                token_type: "bearer".to_string(),
                expires_at,
            })
            .into_response()
        }
        Err(err) => err.into_response(),
    }
}
