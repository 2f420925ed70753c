//! Request-scoped Supabase client backed by cookies.

use crate::supabase::{
    auth::{AuthClient, AuthError, Session, SignUpResponse, User},
    cookies::{self, CookieMethods},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Refresh sessions expiring within this window.
pub const EXPIRY_MARGIN_SECONDS: i64 = 90;

const JWT_AUDIENCE: &str = "authenticated";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: Option<String>,
}

impl From<User> for CurrentUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: Uuid,
    #[serde(default)]
    email: Option<String>,
}

pub struct ServerClient {
    auth: AuthClient,
    storage_key: String,
    cookies: Arc<dyn CookieMethods>,
    jwt_secret: Option<SecretString>,
}

impl std::fmt::Debug for ServerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerClient")
            .field("storage_key", &self.storage_key)
            .field("jwt_secret", &self.jwt_secret.is_some())
            .finish_non_exhaustive()
    }
}

impl ServerClient {
    #[must_use]
    pub fn new(
        auth: AuthClient,
        storage_key: String,
        cookies: Arc<dyn CookieMethods>,
        jwt_secret: Option<SecretString>,
    ) -> Self {
        Self {
            auth,
            storage_key,
            cookies,
            jwt_secret,
        }
    }

    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Session stored in the request cookies, refreshed when close to expiry.
    ///
    /// A rejected refresh clears the session cookies and yields `None`.
    ///
    /// # Errors
    /// Returns an error when the provider cannot be reached.
    #[instrument(skip(self))]
    pub async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let existing = self.cookies.get_all();

        let Some(value) = cookies::combine_chunks(&self.storage_key, &existing) else {
            return Ok(None);
        };

        let Some(session) = cookies::decode_session(&value) else {
            debug!("Discarding unreadable session cookie");
            self.cookies
                .set_all(cookies::removal_cookies(&self.storage_key, &existing));
            return Ok(None);
        };

        let now = OffsetDateTime::now_utc().unix_timestamp();
        let expiring = session
            .expires_at
            .is_some_and(|expires_at| expires_at.saturating_sub(now) <= EXPIRY_MARGIN_SECONDS);

        if !expiring || session.refresh_token.is_empty() {
            return Ok(Some(session));
        }

        match self.auth.refresh_session(&session.refresh_token).await {
            Ok(refreshed) => {
                self.save_session(&refreshed);
                Ok(Some(refreshed))
            }
            Err(err) if err.is_client_error() => {
                warn!("Session refresh rejected: {}", err);
                self.cookies
                    .set_all(cookies::removal_cookies(&self.storage_key, &existing));
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// User behind the current session, if any.
    ///
    /// With a JWT secret the access token is verified locally; otherwise the
    /// provider validates it.
    ///
    /// # Errors
    /// Returns an error when the provider cannot be reached.
    #[instrument(skip(self))]
    pub async fn get_user(&self) -> Result<Option<CurrentUser>, AuthError> {
        let Some(session) = self.get_session().await? else {
            return Ok(None);
        };

        if let Some(secret) = &self.jwt_secret {
            return Ok(verify_access_token(&session.access_token, secret));
        }

        match self.auth.get_user(&session.access_token).await {
            Ok(user) => Ok(Some(user.into())),
            Err(err) if err.is_client_error() => {
                debug!("Access token rejected: {}", err);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Register a user; an auto-confirmed sign-up also logs the user in.
    ///
    /// # Errors
    /// Returns [`AuthError::Api`] with the provider's message on rejection.
    #[instrument(skip(self, password))]
    pub async fn sign_up(&self, email: &str, password: &str, name: &str) -> Result<User, AuthError> {
        match self.auth.sign_up(email, password, name).await? {
            SignUpResponse::Session(session) => {
                self.save_session(&session);
                Ok(session.user)
            }
            SignUpResponse::User(user) => Ok(user),
        }
    }

    fn save_session(&self, session: &Session) {
        let existing = self.cookies.get_all();
        match cookies::session_cookies(&self.storage_key, session, &existing) {
            Ok(to_set) => self.cookies.set_all(to_set),
            Err(err) => warn!("Failed to encode session: {}", err),
        }
    }
}

fn verify_access_token(token: &str, secret: &SecretString) -> Option<CurrentUser> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[JWT_AUDIENCE]);

    match decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &validation,
    ) {
        Ok(data) => Some(CurrentUser {
            id: data.claims.sub,
            email: data.claims.email,
        }),
        Err(err) => {
            debug!("Access token failed verification: {}", err);
            None
        }
    }
}
