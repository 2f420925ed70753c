use tracing::instrument;

pub const GREETING: &str = "Hello Cloudflare Workers!";

#[utoipa::path(
    get,
    path = "/hello",
    responses (
        (status = 200, description = "Greeting", body = String, content_type = "text/plain")
    ),
    tag = "hello",
)]
#[instrument]
pub async fn hello() -> &'static str {
    GREETING
}
