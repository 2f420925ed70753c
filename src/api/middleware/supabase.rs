//! Bridges the Supabase cookie protocol to axum requests and responses.
//!
//! [`supabase_middleware`] parses the `Cookie` header once per request and
//! collects `Set-Cookie` values written during the handler; [`SupabaseServer`]
//! hands handlers a session-aware client over those cookies.

use crate::{
    api::middleware::cookie_options::translate,
    cookie::{self, Cookie, CookieError, CookieOptions},
    supabase::{
        cookies::{CookieMethods, CookieToSet},
        server::ServerClient,
        Supabase,
    },
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{
        header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
        request::Parts,
        HeaderMap, HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
enum WriteError {
    #[error(transparent)]
    Cookie(#[from] CookieError),

    #[error("invalid Set-Cookie header: {0}")]
    Header(#[from] InvalidHeaderValue),
}

/// Request-scoped cookie store: the parsed `Cookie` header in, `Set-Cookie`
/// headers out.
#[derive(Debug, Clone, Default)]
pub struct RequestCookies {
    incoming: Arc<Vec<Cookie>>,
    outgoing: Arc<Mutex<Vec<HeaderValue>>>,
}

impl RequestCookies {
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect::<Vec<_>>()
            .join("; ");

        Self {
            incoming: Arc::new(cookie::parse_cookie_header(&header)),
            outgoing: Arc::default(),
        }
    }

    /// Drain the `Set-Cookie` values written so far.
    #[must_use]
    pub fn take_set_cookie_headers(&self) -> Vec<HeaderValue> {
        let mut outgoing = self
            .outgoing
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *outgoing)
    }

    fn write(&self, cookie: &CookieToSet) -> Result<(), WriteError> {
        let options = cookie
            .options
            .as_ref()
            .map_or_else(CookieOptions::default, translate);

        let serialized = cookie::serialize(&cookie.name, &cookie.value, &options)?;
        let value = HeaderValue::from_str(&serialized)?;

        self.outgoing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(value);

        Ok(())
    }
}

impl CookieMethods for RequestCookies {
    fn get_all(&self) -> Vec<Cookie> {
        self.incoming.as_ref().clone()
    }

    fn set_all(&self, cookies: Vec<CookieToSet>) {
        for cookie in cookies {
            debug!(
                name = %cookie.name,
                value = %preview(&cookie.value),
                options = ?cookie.options,
                "Setting cookie"
            );

            if let Err(err) = self.write(&cookie) {
                error!("Failed to set cookie {}: {}", cookie.name, err);
            }
        }
    }
}

fn preview(value: &str) -> String {
    let head: String = value.chars().take(10).collect();
    format!("{head}...")
}

/// Expose the request cookies to handlers and flush written cookies into the
/// response.
pub async fn supabase_middleware(mut request: Request, next: Next) -> Response {
    let cookies = RequestCookies::from_headers(request.headers());
    request.extensions_mut().insert(cookies.clone());

    let mut response = next.run(request).await;

    for value in cookies.take_set_cookie_headers() {
        response.headers_mut().append(SET_COOKIE, value);
    }

    response
}

/// Extractor for a request-scoped [`ServerClient`].
///
/// Rejects with `500` and the missing variable's name when Supabase is not
/// configured.
pub struct SupabaseServer(pub ServerClient);

fn reject(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
        .into_response()
}

#[async_trait]
impl<S> FromRequestParts<S> for SupabaseServer
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(supabase) = parts.extensions.get::<Arc<Supabase>>().cloned() else {
            error!("Supabase extension is not installed");
            return Err(reject("Supabase is not configured"));
        };

        let Some(cookies) = parts.extensions.get::<RequestCookies>().cloned() else {
            error!("supabase_middleware is not installed");
            return Err(reject("Supabase middleware is not installed"));
        };

        supabase
            .server_client(Arc::new(cookies))
            .map(Self)
            .map_err(|err| {
                error!("{}", err);
                reject(&err.to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cookie::CookiePrefix,
        supabase::cookies::{CookieOptions as ProviderOptions, SameSiteOption},
    };
    use anyhow::Result;
    use axum::{body::Body, http::Request as HttpRequest, routing::get, Router};
    use tower::ServiceExt;

    fn to_set(name: &str, value: &str, options: Option<ProviderOptions>) -> CookieToSet {
        CookieToSet {
            name: name.to_string(),
            value: value.to_string(),
            options,
        }
    }

    fn headers_as_strings(cookies: &RequestCookies) -> Vec<String> {
        cookies
            .take_set_cookie_headers()
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect()
    }

    #[test]
    fn reads_all_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("a=1; b=2"));
        headers.append(COOKIE, HeaderValue::from_static("c=3"));

        let cookies = RequestCookies::from_headers(&headers);
        assert_eq!(
            cookies.get_all(),
            vec![
                Cookie::new("a", "1"),
                Cookie::new("b", "2"),
                Cookie::new("c", "3")
            ]
        );
    }

    #[test]
    fn writes_translated_options() {
        let cookies = RequestCookies::default();
        cookies.set_all(vec![to_set(
            "sb-abc-auth-token",
            "base64-xyz",
            Some(ProviderOptions {
                path: Some("/".to_string()),
                same_site: Some(SameSiteOption::Flag(true)),
                priority: Some("high".to_string()),
                http_only: Some(true),
                ..ProviderOptions::default()
            }),
        )]);

        assert_eq!(
            headers_as_strings(&cookies),
            vec!["sb-abc-auth-token=base64-xyz; Path=/; HttpOnly; SameSite=Strict; Priority=High"]
        );
    }

    #[test]
    fn cookie_without_options_uses_defaults() {
        let cookies = RequestCookies::default();
        cookies.set_all(vec![to_set("plain", "v", None)]);
        assert_eq!(headers_as_strings(&cookies), vec!["plain=v; Path=/"]);
    }

    #[test]
    fn failing_cookie_does_not_abort_batch() {
        let cookies = RequestCookies::default();
        cookies.set_all(vec![
            to_set("first", "1", None),
            to_set(
                "partitioned",
                "2",
                Some(ProviderOptions {
                    partitioned: Some(true),
                    ..ProviderOptions::default()
                }),
            ),
            to_set("bad name", "3", None),
            to_set(
                "last",
                "4",
                Some(ProviderOptions {
                    prefix: Some(CookiePrefix::Host),
                    ..ProviderOptions::default()
                }),
            ),
        ]);

        assert_eq!(
            headers_as_strings(&cookies),
            vec!["first=1; Path=/", "__Host-last=4; Path=/; Secure"]
        );
    }

    #[test]
    fn take_drains_written_headers() {
        let cookies = RequestCookies::default();
        cookies.set_all(vec![to_set("a", "1", None)]);
        assert_eq!(cookies.take_set_cookie_headers().len(), 1);
        assert!(cookies.take_set_cookie_headers().is_empty());
    }

    #[tokio::test]
    async fn middleware_appends_set_cookie_headers() -> Result<()> {
        async fn handler(axum::Extension(cookies): axum::Extension<RequestCookies>) -> &'static str {
            let seen = cookies.get_all();
            cookies.set_all(vec![
                to_set("seen", &seen.len().to_string(), None),
                to_set("other", "x", None),
            ]);
            "ok"
        }

        let app = Router::new()
            .route("/", get(handler))
            .layer(axum::middleware::from_fn(supabase_middleware));

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/")
                    .header(COOKIE, "a=1; b=2")
                    .body(Body::empty())?,
            )
            .await?;

        let set_cookies: Vec<_> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        assert_eq!(set_cookies, vec!["seen=2; Path=/", "other=x; Path=/"]);
        Ok(())
    }

    #[tokio::test]
    async fn extractor_reports_missing_configuration() -> Result<()> {
        async fn handler(_client: SupabaseServer) -> &'static str {
            "unreachable"
        }

        let supabase = Arc::new(Supabase::new(crate::supabase::SupabaseConfig::default())?);
        let app = Router::new()
            .route("/", get(handler))
            .layer(axum::middleware::from_fn(supabase_middleware))
            .layer(axum::Extension(supabase));

        let response = app
            .oneshot(HttpRequest::builder().uri("/").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let json: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(json["error"], "SUPABASE_URL missing!");
        Ok(())
    }
}
