use crate::{
    cli::{
        actions::{server::Args, Action},
        globals::GlobalArgs,
    },
    supabase::SupabaseConfig,
};
use anyhow::Result;
use secrecy::SecretString;
use std::env::var;

// Frontend builds expose the same project under `NEXT_PUBLIC_*` names.
const PUBLIC_SUPABASE_URL: &str = "NEXT_PUBLIC_SUPABASE_URL";
const PUBLIC_SUPABASE_ANON_KEY: &str = "NEXT_PUBLIC_SUPABASE_ANON_KEY";

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn arg(matches: &clap::ArgMatches, id: &str) -> Option<String> {
    non_empty(matches.get_one::<String>(id).cloned())
}

fn arg_or_env(matches: &clap::ArgMatches, id: &str, fallback: &str) -> Option<String> {
    arg(matches, id).or_else(|| non_empty(var(fallback).ok()))
}

fn secret(value: Option<String>) -> Option<SecretString> {
    value.map(SecretString::from)
}

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8787);

    let supabase = SupabaseConfig {
        url: arg_or_env(matches, "supabase-url", PUBLIC_SUPABASE_URL),
        anon_key: secret(arg_or_env(
            matches,
            "supabase-anon-key",
            PUBLIC_SUPABASE_ANON_KEY,
        )),
        service_role_key: secret(arg(matches, "supabase-service-role-key")),
        jwt_secret: secret(arg(matches, "jwt-secret")),
    };

    let globals = GlobalArgs {
        supabase,
        dsn: secret(arg(matches, "dsn")),
        api_key: secret(arg(matches, "api-key")),
        cors_origin: arg(matches, "cors-origin"),
    };

    Ok(Action::Server(Args { port, globals }))
}
