use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

use super::{principal::require_auth, ErrorBody};
use crate::credentials::{AuthFlow, User};

/// Public view of a user. Timestamps are Unix seconds.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MeResponse {
    pub id: String,
    pub identity: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_login_at: Option<i64>,
}

impl From<User> for MeResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            identity: user.identity,
            created_at: user.created_at_unix,
            updated_at: user.updated_at_unix,
            last_login_at: user.last_login_unix,
        }
    }
}

#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Profile of the token holder", body = MeResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
#[instrument(skip(headers, flow))]
pub async fn get_me(headers: HeaderMap, flow: Extension<Arc<AuthFlow>>) -> Response {
    match require_auth(&headers, &flow).await {
        Ok(user) => Json(MeResponse::from(user)).into_response(),
        Err(err) => err.into_response(),
    }
}
