//! Translate provider cookie options into router cookie options.
//!
//! | provider `sameSite`        | router     |
//! |----------------------------|------------|
//! | absent, `false`, `""`      | absent     |
//! | `true`                     | `Strict`   |
//! | `strict`/`lax`/`none` (any case) | `Strict`/`Lax`/`None` |
//! | anything else              | absent     |
//!
//! `priority` follows the same case folding, except that unknown non-empty
//! values are kept verbatim.

use crate::{
    cookie::{self, Priority, SameSite},
    supabase::cookies::{self as provider, SameSiteOption},
};

#[must_use]
pub fn normalize_same_site(value: Option<&SameSiteOption>) -> Option<SameSite> {
    match value? {
        SameSiteOption::Flag(true) => Some(SameSite::Strict),
        SameSiteOption::Flag(false) => None,
        SameSiteOption::Named(name) => match name.to_ascii_lowercase().as_str() {
            "strict" => Some(SameSite::Strict),
            "lax" => Some(SameSite::Lax),
            "none" => Some(SameSite::None),
            _ => None,
        },
    }
}

#[must_use]
pub fn normalize_priority(value: Option<&str>) -> Option<Priority> {
    let value = value.filter(|v| !v.is_empty())?;

    Some(match value.to_ascii_lowercase().as_str() {
        "low" => Priority::Low,
        "medium" => Priority::Medium,
        "high" => Priority::High,
        _ => Priority::Other(value.to_string()),
    })
}

#[must_use]
pub fn translate(options: &provider::CookieOptions) -> cookie::CookieOptions {
    cookie::CookieOptions {
        domain: options.domain.clone(),
        path: options.path.clone(),
        expires: options.expires,
        max_age: options.max_age,
        http_only: options.http_only,
        secure: options.secure,
        same_site: normalize_same_site(options.same_site.as_ref()),
        partitioned: options.partitioned,
        priority: normalize_priority(options.priority.as_deref()),
        prefix: options.prefix,
    }
}
