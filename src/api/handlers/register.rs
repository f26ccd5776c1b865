use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
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
pub struct RegisterRequest {
    identity: String,
    password: String,
    confirm_password: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterResponse {
    pub id: String,
    pub identity: String,
    /// Unix seconds.
    pub created_at: i64,
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Undecodable request body", body = ErrorBody),
        (status = 409, description = "Identity already registered", body = ErrorBody),
        (status = 422, description = "Weak password or invalid identity", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip(flow, payload))]
pub async fn register(
    flow: Extension<Arc<AuthFlow>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(&rejection),
    };

    let password = SecretString::from(request.password);
    let confirm = request.confirm_password.map(SecretString::from);

    match flow
        .register(&request.identity, &password, confirm.as_ref())
        .await
    {
        Ok(user) => (
            StatusCode::CREATED,
            Json(RegisterResponse {
                id: user.id.to_string(),
                identity: user.identity,
                created_at: user.created_at_unix,
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
