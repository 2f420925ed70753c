pub mod hello;
pub mod protected;
pub mod session;
pub mod status;
pub mod users;

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use utoipa::ToSchema;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Plain `{"error": "..."}` body.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    pub error: String,
}

impl ErrorMessage {
    pub fn response(status: StatusCode, message: impl Into<String>) -> Response {
        (
            status,
            Json(Self {
                error: message.into(),
            }),
        )
            .into_response()
    }
}

/// Static key guarding `/api/protected` and the admin listing.
#[derive(Debug, Clone, Default)]
pub struct ApiKey(pub Option<SecretString>);

impl ApiKey {
    /// Compare the `X-API-Key` header against the configured key.
    ///
    /// # Errors
    /// `500` when no key is configured, `401` when the header is missing or wrong.
    #[allow(clippy::result_large_err)]
    pub fn check(&self, headers: &HeaderMap) -> Result<(), Response> {
        let Some(expected) = &self.0 else {
            error!("API_KEY is not configured");
            return Err(ErrorMessage::response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "API_KEY missing!",
            ));
        };

        let provided = headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok());

        if provided == Some(expected.expose_secret()) {
            Ok(())
        } else {
            warn!("Rejected request with missing or invalid API key");
            Err(ErrorMessage::response(
                StatusCode::UNAUTHORIZED,
                "Unauthorized",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(key: Option<&'static str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(key) = key {
            headers.insert(API_KEY_HEADER, HeaderValue::from_static(key));
        }
        headers
    }

    #[test]
    fn api_key_matches() {
        let key = ApiKey(Some(SecretString::from("s3cret")));
        assert!(key.check(&headers(Some("s3cret"))).is_ok());
    }

    #[test]
    fn api_key_rejects_wrong_or_missing_header() {
        let key = ApiKey(Some(SecretString::from("s3cret")));

        let wrong = key.check(&headers(Some("nope"))).err().map(|r| r.status());
        assert_eq!(wrong, Some(StatusCode::UNAUTHORIZED));

        let missing = key.check(&headers(None)).err().map(|r| r.status());
        assert_eq!(missing, Some(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn api_key_unset_is_a_server_error() {
        let status = ApiKey::default()
            .check(&headers(Some("anything")))
            .err()
            .map(|r| r.status());
        assert_eq!(status, Some(StatusCode::INTERNAL_SERVER_ERROR));
    }
}
