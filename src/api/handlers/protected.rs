use crate::api::handlers::{ApiKey, ErrorMessage};
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Protected {
    pub message: String,
}

#[utoipa::path(
    post,
    path = "/api/protected",
    params(
        ("X-API-Key" = String, Header, description = "Static API key")
    ),
    responses (
        (status = 200, description = "API key accepted", body = Protected),
        (status = 401, description = "Missing or invalid API key", body = ErrorMessage),
        (status = 500, description = "API key is not configured", body = ErrorMessage),
    ),
    tag = "protected",
)]
#[instrument(skip_all)]
pub async fn protected(headers: HeaderMap, api_key: Extension<ApiKey>) -> impl IntoResponse {
    if let Err(rejection) = api_key.check(&headers) {
        return rejection;
    }

    debug!("API key accepted");

    (
        StatusCode::OK,
        Json(Protected {
            message: "Authorized".to_string(),
        }),
    )
        .into_response()
}
