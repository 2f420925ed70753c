//! Router-side cookie vocabulary.
//!
//! Only canonical attribute values live here: `SameSite` and `Priority` are
//! capitalized enums and name prefixes are explicit. [`serialize`] renders a
//! `Set-Cookie` value and rejects combinations browsers would drop anyway
//! (prefixed names without `Secure`, lifetimes over 400 days, `Partitioned`
//! without `Secure`).

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use time::{macros::format_description, Duration, OffsetDateTime, UtcOffset};

/// Upper bound for `Max-Age` and `Expires` (RFC 6265bis, 400 days).
pub const MAX_COOKIE_AGE_SECONDS: i64 = 400 * 24 * 60 * 60;

// Same unreserved set as `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chrome's `Priority` attribute. Unknown values are kept as given so newer
/// browser vocabularies still reach the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Priority {
    Low,
    Medium,
    High,
    Other(String),
}

impl Priority {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Other(value) => value,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CookiePrefix {
    Host,
    Secure,
}

impl CookiePrefix {
    #[must_use]
    pub const fn name_prefix(self) -> &'static str {
        match self {
            Self::Host => "__Host-",
            Self::Secure => "__Secure-",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOptions {
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expires: Option<OffsetDateTime>,
    pub max_age: Option<i64>,
    pub http_only: Option<bool>,
    pub secure: Option<bool>,
    pub same_site: Option<SameSite>,
    pub partitioned: Option<bool>,
    pub priority: Option<Priority>,
    pub prefix: Option<CookiePrefix>,
}

#[derive(Debug, Error)]
pub enum CookieError {
    #[error("invalid cookie name {0:?}")]
    InvalidName(String),

    #[error("__Secure- cookie must have the Secure attribute")]
    SecurePrefixWithoutSecure,

    #[error("__Host- cookie must have the Secure attribute")]
    HostPrefixWithoutSecure,

    #[error("__Host- cookie must have Path=/")]
    HostPrefixPath,

    #[error("__Host- cookie must not have a Domain attribute")]
    HostPrefixDomain,

    #[error("Max-Age must not exceed {MAX_COOKIE_AGE_SECONDS} seconds, got {0}")]
    MaxAgeTooLong(i64),

    #[error("Expires must not be more than 400 days in the future")]
    ExpiresTooFar,

    #[error("Partitioned cookie must have the Secure attribute")]
    PartitionedWithoutSecure,

    #[error("failed to format Expires: {0}")]
    Expires(#[from] time::error::Format),
}

/// Render a `Set-Cookie` value for `name`.
///
/// `prefix = secure` forces `Secure`; `prefix = host` forces `Secure`, `Path=/`
/// and drops `Domain`. Without a prefix the path defaults to `/`.
///
/// # Errors
/// Returns a [`CookieError`] when the resulting attributes are inconsistent.
pub fn serialize(name: &str, value: &str, options: &CookieOptions) -> Result<String, CookieError> {
    serialize_at(name, value, options, OffsetDateTime::now_utc())
}

fn serialize_at(
    name: &str,
    value: &str,
    options: &CookieOptions,
    now: OffsetDateTime,
) -> Result<String, CookieError> {
    let mut options = options.clone();

    let name = match options.prefix {
        Some(prefix @ CookiePrefix::Secure) => {
            options.secure = Some(true);
            options.path.get_or_insert_with(|| "/".to_string());
            format!("{}{name}", prefix.name_prefix())
        }
        Some(prefix @ CookiePrefix::Host) => {
            options.secure = Some(true);
            options.path = Some("/".to_string());
            options.domain = None;
            format!("{}{name}", prefix.name_prefix())
        }
        None => {
            options.path.get_or_insert_with(|| "/".to_string());
            name.to_string()
        }
    };

    let value = utf8_percent_encode(value, COMPONENT).to_string();

    render(&name, &value, &options, now)
}

fn render(
    name: &str,
    value: &str,
    options: &CookieOptions,
    now: OffsetDateTime,
) -> Result<String, CookieError> {
    if !valid_name(name) {
        return Err(CookieError::InvalidName(name.to_string()));
    }

    let secure = options.secure.unwrap_or(false);

    if name.starts_with("__Secure-") && !secure {
        return Err(CookieError::SecurePrefixWithoutSecure);
    }

    if name.starts_with("__Host-") {
        if !secure {
            return Err(CookieError::HostPrefixWithoutSecure);
        }
        if options.path.as_deref() != Some("/") {
            return Err(CookieError::HostPrefixPath);
        }
        if options.domain.is_some() {
            return Err(CookieError::HostPrefixDomain);
        }
    }

    let mut cookie = format!("{name}={value}");

    if let Some(max_age) = options.max_age.filter(|age| *age >= 0) {
        if max_age > MAX_COOKIE_AGE_SECONDS {
            return Err(CookieError::MaxAgeTooLong(max_age));
        }
        cookie.push_str(&format!("; Max-Age={max_age}"));
    }

    if let Some(domain) = options.domain.as_deref().filter(|d| !d.is_empty()) {
        cookie.push_str(&format!("; Domain={domain}"));
    }

    if let Some(path) = options.path.as_deref().filter(|p| !p.is_empty()) {
        cookie.push_str(&format!("; Path={path}"));
    }

    if let Some(expires) = options.expires {
        if expires - now > Duration::seconds(MAX_COOKIE_AGE_SECONDS) {
            return Err(CookieError::ExpiresTooFar);
        }
        let formatted = expires.to_offset(UtcOffset::UTC).format(format_description!(
            "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
        ))?;
        cookie.push_str(&format!("; Expires={formatted}"));
    }

    if options.http_only.unwrap_or(false) {
        cookie.push_str("; HttpOnly");
    }

    if secure {
        cookie.push_str("; Secure");
    }

    if let Some(same_site) = options.same_site {
        cookie.push_str(&format!("; SameSite={same_site}"));
    }

    if let Some(priority) = &options.priority {
        cookie.push_str(&format!("; Priority={priority}"));
    }

    if options.partitioned.unwrap_or(false) {
        if !secure {
            return Err(CookieError::PartitionedWithoutSecure);
        }
        cookie.push_str("; Partitioned");
    }

    Ok(cookie)
}

// RFC 6265 token: visible ASCII minus separators.
fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic()
                && !matches!(
                    b,
                    b'(' | b')'
                        | b'<'
                        | b'>'
                        | b'@'
                        | b','
                        | b';'
                        | b':'
                        | b'\\'
                        | b'"'
                        | b'/'
                        | b'['
                        | b']'
                        | b'?'
                        | b'='
                        | b'{'
                        | b'}'
                )
        })
}

/// Parse a request `Cookie` header into name/value pairs.
///
/// The first occurrence of a name wins. Values are percent-decoded when they
/// decode to valid UTF-8 and kept verbatim otherwise.
#[must_use]
pub fn parse_cookie_header(header: &str) -> Vec<Cookie> {
    let mut cookies: Vec<Cookie> = Vec::new();

    for pair in header.split(';') {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };

        let name = name.trim();
        if name.is_empty() || cookies.iter().any(|c| c.name == name) {
            continue;
        }

        let mut value = value.trim();
        if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
            value = &value[1..value.len() - 1];
        }

        let value = if value.contains('%') {
            percent_decode_str(value)
                .decode_utf8()
                .map_or_else(|_| value.to_string(), |decoded| decoded.into_owned())
        } else {
            value.to_string()
        };

        cookies.push(Cookie::new(name, value));
    }

    cookies
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn now() -> OffsetDateTime {
        datetime!(2025-01-01 00:00:00 UTC)
    }

    #[test]
    fn serialize_defaults_path() -> Result<(), CookieError> {
        let cookie = serialize_at("theme", "dark", &CookieOptions::default(), now())?;
        assert_eq!(cookie, "theme=dark; Path=/");
        Ok(())
    }

    #[test]
    fn serialize_all_attributes_in_order() -> Result<(), CookieError> {
        let options = CookieOptions {
            domain: Some("example.com".to_string()),
            path: Some("/app".to_string()),
            expires: Some(datetime!(2025-01-02 08:49:37 UTC)),
            max_age: Some(3600),
            http_only: Some(true),
            secure: Some(true),
            same_site: Some(SameSite::Lax),
            partitioned: Some(true),
            priority: Some(Priority::High),
            prefix: None,
        };

        let cookie = serialize_at("sid", "abc", &options, now())?;
        assert_eq!(
            cookie,
            "sid=abc; Max-Age=3600; Domain=example.com; Path=/app; \
             Expires=Thu, 02 Jan 2025 08:49:37 GMT; HttpOnly; Secure; SameSite=Lax; \
             Priority=High; Partitioned"
        );
        Ok(())
    }

    #[test]
    fn serialize_encodes_value() -> Result<(), CookieError> {
        let cookie = serialize_at("n", "a b;c", &CookieOptions::default(), now())?;
        assert_eq!(cookie, "n=a%20b%3Bc; Path=/");
        Ok(())
    }

    #[test]
    fn secure_prefix_forces_secure() -> Result<(), CookieError> {
        let options = CookieOptions {
            prefix: Some(CookiePrefix::Secure),
            ..CookieOptions::default()
        };
        let cookie = serialize_at("token", "t", &options, now())?;
        assert_eq!(cookie, "__Secure-token=t; Path=/; Secure");
        Ok(())
    }

    #[test]
    fn host_prefix_drops_domain_and_pins_path() -> Result<(), CookieError> {
        let options = CookieOptions {
            prefix: Some(CookiePrefix::Host),
            domain: Some("example.com".to_string()),
            path: Some("/nested".to_string()),
            ..CookieOptions::default()
        };
        let cookie = serialize_at("token", "t", &options, now())?;
        assert_eq!(cookie, "__Host-token=t; Path=/; Secure");
        Ok(())
    }

    #[test]
    fn prefixed_names_without_secure_are_rejected() {
        let options = CookieOptions::default();
        assert!(matches!(
            serialize_at("__Secure-x", "v", &options, now()),
            Err(CookieError::SecurePrefixWithoutSecure)
        ));
        assert!(matches!(
            serialize_at("__Host-x", "v", &options, now()),
            Err(CookieError::HostPrefixWithoutSecure)
        ));

        let secure_with_domain = CookieOptions {
            secure: Some(true),
            domain: Some("example.com".to_string()),
            ..CookieOptions::default()
        };
        assert!(matches!(
            serialize_at("__Host-x", "v", &secure_with_domain, now()),
            Err(CookieError::HostPrefixDomain)
        ));
    }

    #[test]
    fn lifetimes_over_400_days_are_rejected() {
        let options = CookieOptions {
            max_age: Some(MAX_COOKIE_AGE_SECONDS + 1),
            ..CookieOptions::default()
        };
        assert!(matches!(
            serialize_at("a", "b", &options, now()),
            Err(CookieError::MaxAgeTooLong(_))
        ));

        let options = CookieOptions {
            expires: Some(now() + Duration::days(401)),
            ..CookieOptions::default()
        };
        assert!(matches!(
            serialize_at("a", "b", &options, now()),
            Err(CookieError::ExpiresTooFar)
        ));
    }

    #[test]
    fn max_age_at_limit_is_accepted() -> Result<(), CookieError> {
        let options = CookieOptions {
            max_age: Some(MAX_COOKIE_AGE_SECONDS),
            ..CookieOptions::default()
        };
        let cookie = serialize_at("a", "b", &options, now())?;
        assert!(cookie.contains("Max-Age=34560000"));
        Ok(())
    }

    #[test]
    fn partitioned_requires_secure() {
        let options = CookieOptions {
            partitioned: Some(true),
            ..CookieOptions::default()
        };
        assert!(matches!(
            serialize_at("a", "b", &options, now()),
            Err(CookieError::PartitionedWithoutSecure)
        ));
    }

    #[test]
    fn other_priority_is_written_verbatim() -> Result<(), CookieError> {
        let options = CookieOptions {
            priority: Some(Priority::Other("urgent".to_string())),
            ..CookieOptions::default()
        };
        let cookie = serialize_at("a", "b", &options, now())?;
        assert!(cookie.ends_with("; Priority=urgent"));
        Ok(())
    }

    #[test]
    fn invalid_names_are_rejected() {
        for name in ["", "a b", "a;b", "a=b", "\u{e9}"] {
            assert!(
                matches!(
                    serialize_at(name, "v", &CookieOptions::default(), now()),
                    Err(CookieError::InvalidName(_))
                ),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn parse_cookie_header_pairs() {
        let cookies = parse_cookie_header(r#"a=1; b = two ; c="quoted"; d=%7Bx%7D; flag; a=dup; e="#);
        assert_eq!(
            cookies,
            vec![
                Cookie::new("a", "1"),
                Cookie::new("b", "two"),
                Cookie::new("c", "quoted"),
                Cookie::new("d", "{x}"),
                Cookie::new("e", ""),
            ]
        );
    }

    #[test]
    fn parse_cookie_header_keeps_undecodable_values() {
        let cookies = parse_cookie_header("x=%E0%A4%A");
        assert_eq!(cookies, vec![Cookie::new("x", "%E0%A4%A")]);
    }

    #[test]
    fn parse_empty_header() {
        assert!(parse_cookie_header("").is_empty());
    }
}
