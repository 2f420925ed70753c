pub mod cookie_options;
pub use self::cookie_options::{normalize_priority, normalize_same_site, translate};

pub mod supabase;
pub use self::supabase::{supabase_middleware, RequestCookies, SupabaseServer};
