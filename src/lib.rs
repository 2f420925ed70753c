//! # Registra (Registration & Session Edge API)
//!
//! `registra` is a small HTTP service that sits in front of a Supabase project.
//! Supabase (`GoTrue`) stays the authority for credentials, sessions and storage;
//! this crate owns the glue around it:
//!
//! - **Routes:** `/hello`, `/api/status`, `/api/users`, `/api/v1/users` and
//!   `/api/protected`, documented through `OpenAPI`.
//! - **Validation:** registration payloads are checked before any call reaches
//!   the auth provider.
//! - **Cookie sessions:** the provider's server-side cookie protocol (storage key,
//!   `base64-` encoding, chunking) is spoken over the request's `Cookie` header
//!   and the response's `Set-Cookie` headers.
//!
//! ## Cookie vocabularies
//!
//! The provider describes cookies with a loose option record (`sameSite` may be a
//! boolean or a string in any case, `priority` may be lowercase). The router only
//! writes canonical attributes. The adapter in [`api::middleware`] normalizes every
//! record per request and writes each cookie independently, so one malformed
//! cookie never drops the rest of the batch.
//!
//! ## Typed client
//!
//! [`client::ApiClient`] reuses the request and response types of the handlers,
//! so consumers get compile-time checked shapes without a separate schema.

pub mod api;
pub mod cli;
pub mod client;
pub mod cookie;
pub mod supabase;
pub mod validation;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
