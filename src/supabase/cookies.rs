//! Supabase server-side cookie session protocol.
//!
//! The session is stored under `sb-<project ref>-auth-token` as
//! `base64-<base64url(JSON)>`. Values over [`MAX_CHUNK_SIZE`] bytes are split into
//! `<key>.0`, `<key>.1`, ... Writes always clear chunks that are no longer part
//! of the stored value.

use crate::{
    cookie::{Cookie, CookiePrefix, MAX_COOKIE_AGE_SECONDS},
    supabase::auth::Session,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;
use url::Url;

pub const MAX_CHUNK_SIZE: usize = 3180;

pub const BASE64_PREFIX: &str = "base64-";

/// `sameSite` as the provider sends it: a flag or a name in any case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SameSiteOption {
    Flag(bool),
    Named(String),
}

/// Cookie options in the provider's vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOptions {
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expires: Option<OffsetDateTime>,
    pub max_age: Option<i64>,
    pub http_only: Option<bool>,
    pub secure: Option<bool>,
    pub same_site: Option<SameSiteOption>,
    pub partitioned: Option<bool>,
    pub priority: Option<String>,
    pub prefix: Option<CookiePrefix>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieToSet {
    pub name: String,
    pub value: String,
    pub options: Option<CookieOptions>,
}

/// Cookie access the session protocol needs from the HTTP layer.
pub trait CookieMethods: Send + Sync {
    fn get_all(&self) -> Vec<Cookie>;

    fn set_all(&self, cookies: Vec<CookieToSet>);
}

#[must_use]
pub fn default_cookie_options() -> CookieOptions {
    CookieOptions {
        path: Some("/".to_string()),
        same_site: Some(SameSiteOption::Named("lax".to_string())),
        http_only: Some(false),
        max_age: Some(MAX_COOKIE_AGE_SECONDS),
        ..CookieOptions::default()
    }
}

fn removal_options() -> CookieOptions {
    CookieOptions {
        max_age: Some(0),
        ..default_cookie_options()
    }
}

/// `sb-<first host label>-auth-token`
#[must_use]
pub fn storage_key(project_url: &Url) -> String {
    let reference = project_url
        .host_str()
        .and_then(|host| host.split('.').next())
        .unwrap_or_default();

    format!("sb-{reference}-auth-token")
}

/// # Errors
/// Returns an error if the session cannot be serialized.
pub fn encode_session(session: &Session) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(session)?;
    Ok(format!(
        "{BASE64_PREFIX}{}",
        Base64UrlUnpadded::encode_string(&json)
    ))
}

/// Decode a stored session value, `base64-` prefixed or raw JSON.
#[must_use]
pub fn decode_session(value: &str) -> Option<Session> {
    let json = match value.strip_prefix(BASE64_PREFIX) {
        Some(encoded) => {
            match Base64UrlUnpadded::decode_vec(encoded.trim_end_matches('=')) {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!("Failed to decode session cookie: {}", e);
                    return None;
                }
            }
        }
        None => value.as_bytes().to_vec(),
    };

    serde_json::from_slice(&json)
        .map_err(|e| debug!("Failed to parse session cookie: {}", e))
        .ok()
}

/// Split `value` into cookies of at most [`MAX_CHUNK_SIZE`] bytes.
#[must_use]
pub fn chunk(key: &str, value: &str) -> Vec<Cookie> {
    if value.len() <= MAX_CHUNK_SIZE {
        return vec![Cookie::new(key, value)];
    }

    let mut chunks = Vec::new();
    let mut rest = value;

    while !rest.is_empty() {
        let mut end = rest.len().min(MAX_CHUNK_SIZE);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        let (head, tail) = rest.split_at(end);
        chunks.push(Cookie::new(format!("{key}.{}", chunks.len()), head));
        rest = tail;
    }

    chunks
}

/// Reassemble a value stored under `key`, plain or chunked.
#[must_use]
pub fn combine_chunks(key: &str, cookies: &[Cookie]) -> Option<String> {
    let find = |name: &str| {
        cookies
            .iter()
            .find(|cookie| cookie.name == name)
            .map(|cookie| cookie.value.as_str())
    };

    if let Some(value) = find(key) {
        return Some(value.to_string());
    }

    let mut combined = String::new();
    for index in 0.. {
        match find(&format!("{key}.{index}")) {
            Some(value) => combined.push_str(value),
            None if index == 0 => return None,
            None => break,
        }
    }

    Some(combined)
}

fn is_storage_cookie(key: &str, name: &str) -> bool {
    name == key
        || name
            .strip_prefix(key)
            .and_then(|rest| rest.strip_prefix('.'))
            .is_some_and(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
}

/// Cookies that store `session` under `key`, plus removals for stale chunks.
///
/// # Errors
/// Returns an error if the session cannot be serialized.
pub fn session_cookies(
    key: &str,
    session: &Session,
    existing: &[Cookie],
) -> Result<Vec<CookieToSet>, serde_json::Error> {
    let encoded = encode_session(session)?;
    let chunks = chunk(key, &encoded);

    let mut cookies: Vec<CookieToSet> = existing
        .iter()
        .filter(|cookie| is_storage_cookie(key, &cookie.name))
        .filter(|cookie| !chunks.iter().any(|c| c.name == cookie.name))
        .map(|cookie| CookieToSet {
            name: cookie.name.clone(),
            value: String::new(),
            options: Some(removal_options()),
        })
        .collect();

    cookies.extend(chunks.into_iter().map(|cookie| CookieToSet {
        name: cookie.name,
        value: cookie.value,
        options: Some(default_cookie_options()),
    }));

    Ok(cookies)
}

/// Removals for every cookie holding the session under `key`.
#[must_use]
pub fn removal_cookies(key: &str, existing: &[Cookie]) -> Vec<CookieToSet> {
    existing
        .iter()
        .filter(|cookie| is_storage_cookie(key, &cookie.name))
        .map(|cookie| CookieToSet {
            name: cookie.name.clone(),
            value: String::new(),
            options: Some(removal_options()),
        })
        .collect()
}
