//! Supabase glue: project configuration, the `GoTrue` HTTP client and the
//! server-side cookie session protocol.

pub mod auth;
pub mod cookies;
pub mod server;

use crate::APP_USER_AGENT;
use anyhow::Result;
use reqwest::Client;
use secrecy::SecretString;
use std::sync::Arc;
use url::Url;

use self::{auth::AuthClient, auth::AuthError, cookies::CookieMethods, server::ServerClient};

#[derive(Debug, Clone, Default)]
pub struct SupabaseConfig {
    pub url: Option<String>,
    pub anon_key: Option<SecretString>,
    pub service_role_key: Option<SecretString>,
    pub jwt_secret: Option<SecretString>,
}

/// Process-wide Supabase handle: configuration plus a pooled HTTP client.
///
/// Missing configuration is not an error here; it surfaces on the first
/// request that needs it, so routes that never talk to Supabase keep working.
#[derive(Debug, Clone)]
pub struct Supabase {
    config: SupabaseConfig,
    http: Client,
}

impl Supabase {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: SupabaseConfig) -> Result<Self> {
        let http = Client::builder().user_agent(APP_USER_AGENT).build()?;

        Ok(Self { config, http })
    }

    #[must_use]
    pub const fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    fn project_url(&self) -> Result<Url, AuthError> {
        let url = self
            .config
            .url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or(AuthError::MissingConfig("SUPABASE_URL"))?;

        Ok(Url::parse(url)?)
    }

    /// Client authenticated with the anon key.
    ///
    /// # Errors
    /// Returns [`AuthError::MissingConfig`] when the URL or anon key is unset.
    pub fn auth(&self) -> Result<AuthClient, AuthError> {
        let url = self.project_url()?;
        let key = self
            .config
            .anon_key
            .clone()
            .ok_or(AuthError::MissingConfig("SUPABASE_ANON_KEY"))?;

        Ok(AuthClient::new(self.http.clone(), url, key))
    }

    /// Client authenticated with the service-role key, for admin endpoints.
    ///
    /// # Errors
    /// Returns [`AuthError::MissingConfig`] when the URL or service-role key is unset.
    pub fn admin(&self) -> Result<AuthClient, AuthError> {
        let url = self.project_url()?;
        let key = self
            .config
            .service_role_key
            .clone()
            .ok_or(AuthError::MissingConfig("SUPABASE_SERVICE_ROLE_KEY"))?;

        Ok(AuthClient::new(self.http.clone(), url, key))
    }

    /// Request-scoped client reading and writing the session through `cookies`.
    ///
    /// # Errors
    /// Returns [`AuthError::MissingConfig`] when the URL or anon key is unset.
    pub fn server_client(
        &self,
        cookies: Arc<dyn CookieMethods>,
    ) -> Result<ServerClient, AuthError> {
        let auth = self.auth()?;
        let storage_key = cookies::storage_key(auth.project_url());

        Ok(ServerClient::new(
            auth,
            storage_key,
            cookies,
            self.config.jwt_secret.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: Option<&str>, anon: Option<&str>) -> SupabaseConfig {
        SupabaseConfig {
            url: url.map(str::to_string),
            anon_key: anon.map(SecretString::from),
            ..SupabaseConfig::default()
        }
    }

    #[test]
    fn auth_requires_url() -> Result<()> {
        let supabase = Supabase::new(config(None, Some("anon")))?;
        let err = supabase.auth().err().map(|e| e.to_string());
        assert_eq!(err.as_deref(), Some("SUPABASE_URL missing!"));
        Ok(())
    }

    #[test]
    fn auth_requires_anon_key() -> Result<()> {
        let supabase = Supabase::new(config(Some("https://abc.supabase.co"), None))?;
        let err = supabase.auth().err().map(|e| e.to_string());
        assert_eq!(err.as_deref(), Some("SUPABASE_ANON_KEY missing!"));
        Ok(())
    }

    #[test]
    fn blank_url_counts_as_missing() -> Result<()> {
        let supabase = Supabase::new(config(Some("  "), Some("anon")))?;
        assert!(matches!(
            supabase.auth(),
            Err(AuthError::MissingConfig("SUPABASE_URL"))
        ));
        Ok(())
    }

    #[test]
    fn admin_requires_service_role_key() -> Result<()> {
        let supabase = Supabase::new(config(Some("https://abc.supabase.co"), Some("anon")))?;
        assert!(matches!(
            supabase.admin(),
            Err(AuthError::MissingConfig("SUPABASE_SERVICE_ROLE_KEY"))
        ));
        Ok(())
    }
}
