//! Typed HTTP client for the API.
//!
//! Request and response bodies are the handlers' own types, so a change in a
//! handler's shape breaks the client at compile time.

use crate::{
    api::handlers::{
        protected::Protected, session::SessionStatus, status::Status, users::UserCreated,
        users::UserSummary, ErrorMessage, API_KEY_HEADER,
    },
    validation::{ApiError, ApiResponse, CreateUser, Pagination},
    APP_USER_AGENT,
};
use reqwest::{header::COOKIE, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::env::var;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8787/";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid base URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Outcome of `POST /api/v1/users`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Created(UserCreated),
    /// Payload failed validation; the provider was not called.
    Invalid(ApiError),
    /// The auth provider refused the sign-up.
    Rejected(String),
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    cookie: Option<String>,
}

impl ApiClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: Url) -> Result<Self, ClientError> {
        let http = Client::builder().user_agent(APP_USER_AGENT).build()?;

        Ok(Self {
            http,
            base_url,
            cookie: None,
        })
    }

    /// Base URL from `API_URL`, then `NEXT_PUBLIC_API_URL`, then
    /// [`DEFAULT_BASE_URL`].
    ///
    /// # Errors
    /// Returns an error if the configured URL does not parse.
    pub fn from_env() -> Result<Self, ClientError> {
        let base_url = var("API_URL")
            .or_else(|_| var("NEXT_PUBLIC_API_URL"))
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Self::new(Url::parse(&base_url)?)
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Send `cookie` as the `Cookie` header on every request.
    #[must_use]
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.cookie {
            Some(cookie) => builder.header(COOKIE, cookie),
            None => builder,
        }
    }

    /// # Errors
    /// Returns an error on transport failure or a non-2xx status.
    pub async fn hello(&self) -> Result<String, ClientError> {
        let response = self
            .request(self.http.get(self.url("hello")?))
            .send()
            .await?;

        Ok(expect_success(response).await?.text().await?)
    }

    /// Status is returned for both `200` and `503`.
    ///
    /// # Errors
    /// Returns an error on transport failure or any other status.
    pub async fn status(&self) -> Result<Status, ClientError> {
        let response = self
            .request(self.http.get(self.url("api/status")?))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::SERVICE_UNAVAILABLE => Ok(response.json().await?),
            _ => Err(unexpected(response).await),
        }
    }

    /// # Errors
    /// Returns an error on transport failure or a non-2xx status.
    pub async fn me(&self) -> Result<SessionStatus, ClientError> {
        let response = self
            .request(self.http.get(self.url("api/users")?))
            .send()
            .await?;

        json(response).await
    }

    /// # Errors
    /// Returns an error on transport failure or an unexpected status.
    #[instrument(skip_all)]
    pub async fn register(&self, user: &CreateUser) -> Result<Registration, ClientError> {
        let response = self
            .request(self.http.post(self.url("api/v1/users")?))
            .json(user)
            .send()
            .await?;

        let status = response.status();
        debug!("register returned {}", status);

        match status {
            StatusCode::CREATED => Ok(Registration::Created(response.json().await?)),
            StatusCode::BAD_REQUEST => {
                let body: serde_json::Value = response.json().await?;

                if let Some(error) = body.get("error").and_then(|e| e.as_str()) {
                    return Ok(Registration::Rejected(error.to_string()));
                }

                let envelope: ApiResponse<()> = serde_json::from_value(body.clone())
                    .map_err(|_| ClientError::Status {
                        status: status.as_u16(),
                        body: body.to_string(),
                    })?;

                envelope
                    .error
                    .map(Registration::Invalid)
                    .ok_or_else(|| ClientError::Status {
                        status: status.as_u16(),
                        body: body.to_string(),
                    })
            }
            _ => Err(unexpected(response).await),
        }
    }

    /// # Errors
    /// Returns an error on transport failure or a non-2xx status.
    pub async fn protected(&self, api_key: &str) -> Result<Protected, ClientError> {
        let response = self
            .request(self.http.post(self.url("api/protected")?))
            .header(API_KEY_HEADER, api_key)
            .send()
            .await?;

        json(response).await
    }

    /// # Errors
    /// Returns an error on transport failure or a non-2xx status.
    pub async fn list_users(
        &self,
        api_key: &str,
        pagination: Pagination,
    ) -> Result<ApiResponse<Vec<UserSummary>>, ClientError> {
        let response = self
            .request(self.http.get(self.url("api/v1/users")?))
            .header(API_KEY_HEADER, api_key)
            .query(&pagination)
            .send()
            .await?;

        json(response).await
    }
}

async fn expect_success(response: Response) -> Result<Response, ClientError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(unexpected(response).await)
    }
}

async fn json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    Ok(expect_success(response).await?.json().await?)
}

async fn unexpected(response: Response) -> ClientError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();

    // prefer the `{"error": ...}` message when the body has one
    let body = serde_json::from_str::<ErrorMessage>(&text)
        .map(|message| message.error)
        .unwrap_or(text);

    ClientError::Status { status, body }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use wiremock::{
        matchers::{header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    async fn client(server: &MockServer) -> Result<ApiClient> {
        Ok(ApiClient::new(Url::parse(&server.uri())?)?)
    }

    #[test]
    fn base_url_from_env() {
        temp_env::with_vars(
            [
                ("API_URL", None::<&str>),
                ("NEXT_PUBLIC_API_URL", Some("http://api.example.com/")),
            ],
            || {
                let client = ApiClient::from_env().map(|c| c.base_url().to_string());
                assert_eq!(client.ok().as_deref(), Some("http://api.example.com/"));
            },
        );

        temp_env::with_vars(
            [
                ("API_URL", Some("http://primary.example.com/")),
                ("NEXT_PUBLIC_API_URL", Some("http://api.example.com/")),
            ],
            || {
                let client = ApiClient::from_env().map(|c| c.base_url().to_string());
                assert_eq!(client.ok().as_deref(), Some("http://primary.example.com/"));
            },
        );

        temp_env::with_vars(
            [
                ("API_URL", None::<&str>),
                ("NEXT_PUBLIC_API_URL", None::<&str>),
            ],
            || {
                let client = ApiClient::from_env().map(|c| c.base_url().to_string());
                assert_eq!(client.ok().as_deref(), Some(DEFAULT_BASE_URL));
            },
        );
    }

    #[tokio::test]
    async fn sends_cookie_header() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/users"))
            .and(header("cookie", "a=1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "message": "You are not logged in." })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let me = client(&server).await?.with_cookie("a=1").me().await?;
        assert_eq!(me.user_id, None);
        Ok(())
    }

    #[tokio::test]
    async fn register_distinguishes_outcomes() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/users"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({ "error": "User already registered" })),
            )
            .mount(&server)
            .await;

        let user = CreateUser {
            name: "Taro".to_string(),
            email: "taro@example.com".to_string(),
            password: "Passw0rd!".to_string(),
            confirm_password: "Passw0rd!".to_string(),
            age: None,
        };

        let outcome = client(&server).await?.register(&user).await?;
        assert_eq!(
            outcome,
            Registration::Rejected("User already registered".to_string())
        );
        Ok(())
    }

    #[tokio::test]
    async fn unexpected_status_carries_error_message() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/protected"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(serde_json::json!({ "error": "Unauthorized" })),
            )
            .mount(&server)
            .await;

        let err = client(&server).await?.protected("wrong").await.err();
        assert!(matches!(
            err,
            Some(ClientError::Status { status: 401, ref body }) if body == "Unauthorized"
        ));
        Ok(())
    }

    #[tokio::test]
    async fn list_users_sends_pagination() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users"))
            .and(query_param("page", "2"))
            .and(query_param("limit", "5"))
            .and(header(API_KEY_HEADER, "s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": [],
                "meta": { "page": 2, "limit": 5, "total": 6, "totalPages": 2 }
            })))
            .mount(&server)
            .await;

        let page = client(&server)
            .await?
            .list_users("s3cret", Pagination { page: 2, limit: 5 })
            .await?;
        assert!(page.success);
        assert_eq!(page.meta.map(|m| m.total_pages), Some(2));
        Ok(())
    }
}
