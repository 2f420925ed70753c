use crate::supabase::SupabaseConfig;
use secrecy::SecretString;

/// Runtime configuration shared by every request.
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub supabase: SupabaseConfig,
    pub dsn: Option<SecretString>,
    pub api_key: Option<SecretString>,
    pub cors_origin: Option<String>,
}
