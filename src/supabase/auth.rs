//! `GoTrue` REST client (`/auth/v1/...`).

use reqwest::{header::HeaderMap, Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, error, instrument};
use url::Url;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0} missing!")]
    MissingConfig(&'static str),

    #[error("invalid Supabase URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("auth request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid session: {0}")]
    InvalidSession(String),
}

impl AuthError {
    /// True when the provider rejected the request itself (4xx), as opposed to
    /// transport failures or misconfiguration.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status >= 400 && *status < 500)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub aud: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
    #[serde(default)]
    pub app_metadata: Value,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identities: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default = "bearer")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub refresh_token: String,
    pub user: User,
}

fn bearer() -> String {
    "bearer".to_string()
}

impl Session {
    /// Fill `expires_at` from `expires_in` when the provider omitted it.
    #[must_use]
    pub fn with_expiry(mut self, now: OffsetDateTime) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = Some(now.unix_timestamp().saturating_add(self.expires_in));
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignUpResponse {
    /// Auto-confirmed sign-up: the user is logged in right away.
    Session(Session),
    /// Confirmation pending: only the user record is returned.
    User(User),
}

impl SignUpResponse {
    #[must_use]
    pub const fn user(&self) -> &User {
        match self {
            Self::Session(session) => &session.user,
            Self::User(user) => user,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserPage {
    pub users: Vec<User>,
    pub total: u64,
}

#[derive(Debug, Deserialize)]
struct UserList {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
    error_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthClient {
    http: Client,
    project_url: Url,
    api_key: SecretString,
}

impl AuthClient {
    #[must_use]
    pub fn new(http: Client, project_url: Url, api_key: SecretString) -> Self {
        Self {
            http,
            project_url,
            api_key,
        }
    }

    #[must_use]
    pub const fn project_url(&self) -> &Url {
        &self.project_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        let base = self.project_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/auth/v1/{path}"))?)
    }

    fn api_headers(&self, bearer: Option<&str>) -> HeaderMap {
        let key = self.api_key.expose_secret();
        let mut headers = HeaderMap::new();
        if let Ok(value) = key.parse() {
            headers.insert("apikey", value);
        }
        if let Ok(value) = format!("Bearer {}", bearer.unwrap_or(key)).parse() {
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
        headers
    }

    /// Register a new user with email and password.
    ///
    /// # Errors
    /// Returns [`AuthError::Api`] when `GoTrue` rejects the sign-up.
    #[instrument(skip(self, password))]
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<SignUpResponse, AuthError> {
        let url = self.endpoint("signup")?;

        let payload = json!({
            "email": email,
            "password": password,
            "data": { "name": name },
        });

        let response = self
            .http
            .post(url)
            .headers(self.api_headers(None))
            .json(&payload)
            .send()
            .await?;

        let body: Value = check(response).await?.json().await?;

        if body.get("access_token").is_some() {
            let session: Session = serde_json::from_value(body)
                .map_err(|e| AuthError::InvalidSession(e.to_string()))?;
            debug!("sign-up returned a session");
            Ok(SignUpResponse::Session(
                session.with_expiry(OffsetDateTime::now_utc()),
            ))
        } else {
            let user: User = serde_json::from_value(body)
                .map_err(|e| AuthError::InvalidSession(e.to_string()))?;
            debug!("sign-up pending confirmation");
            Ok(SignUpResponse::User(user))
        }
    }

    /// Resolve the user behind an access token.
    ///
    /// # Errors
    /// Returns [`AuthError::Api`] when the token is invalid or expired.
    #[instrument(skip_all)]
    pub async fn get_user(&self, access_token: &str) -> Result<User, AuthError> {
        let url = self.endpoint("user")?;

        let response = self
            .http
            .get(url)
            .headers(self.api_headers(Some(access_token)))
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    /// Exchange a refresh token for a new session.
    ///
    /// # Errors
    /// Returns [`AuthError::Api`] when the refresh token was revoked or already used.
    #[instrument(skip_all)]
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut()
            .append_pair("grant_type", "refresh_token");

        let response = self
            .http
            .post(url)
            .headers(self.api_headers(None))
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let session: Session = check(response).await?.json().await?;

        Ok(session.with_expiry(OffsetDateTime::now_utc()))
    }

    /// List users (requires the service-role key).
    ///
    /// # Errors
    /// Returns [`AuthError::Api`] when the key lacks admin rights.
    #[instrument(skip(self))]
    pub async fn list_users(&self, page: u32, per_page: u32) -> Result<UserPage, AuthError> {
        let mut url = self.endpoint("admin/users")?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &per_page.to_string());

        let response = check(
            self.http
                .get(url)
                .headers(self.api_headers(None))
                .send()
                .await?,
        )
        .await?;

        let total = response
            .headers()
            .get("x-total-count")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());

        let list: UserList = response.json().await?;
        let total = total.unwrap_or(list.users.len() as u64);

        Ok(UserPage {
            users: list.users,
            total,
        })
    }
}

// Turn non-2xx responses into `AuthError::Api` with the provider's message.
async fn check(response: Response) -> Result<Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: ErrorBody = response.json().await.unwrap_or_default();

    let message = body
        .msg
        .or(body.message)
        .or(body.error_description)
        .or_else(|| body.error.clone())
        .unwrap_or_else(|| format!("HTTP {status}"));

    let code = body.error_code.or(body.error);

    if status.is_server_error() {
        error!("GoTrue request failed: {} - {}", status, message);
    } else {
        debug!("GoTrue rejected request: {} - {}", status, message);
    }

    Err(AuthError::Api {
        status: status.as_u16(),
        code,
        message,
    })
}
