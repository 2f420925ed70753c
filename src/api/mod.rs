use crate::{
    api::{
        handlers::{hello, protected, session, status, users, ApiKey},
        middleware::supabase_middleware,
    },
    cli::globals::GlobalArgs,
    supabase::Supabase,
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::get,
    Extension, Router,
};
use secrecy::ExposeSecret;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug_span, error, info, Span};
use ulid::Ulid;
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
pub mod middleware;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    api_router()
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Routes added outside (like the `/api/user` alias) are not documented.
fn api_router() -> OpenApiRouter {
    let mut openapi = cargo_openapi();
    openapi.tags = Some(
        [
            ("hello", "Greeting"),
            ("status", "Service and database status"),
            ("session", "Cookie session of the caller"),
            ("users", "Registration and admin listing"),
            ("protected", "Static API key check"),
        ]
        .into_iter()
        .map(|(name, description)| {
            let mut tag = Tag::new(name);
            tag.description = Some(description.to_string());
            tag
        })
        .collect(),
    );

    OpenApiRouter::with_openapi(openapi)
        .routes(routes!(hello::hello))
        .routes(routes!(status::status))
        .routes(routes!(session::me))
        .routes(routes!(users::create_user, users::list_users))
        .routes(routes!(protected::protected))
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = optional_str(env!("CARGO_PKG_LICENSE")).map(|identifier| {
        let mut license = License::new(identifier);
        license.identifier = Some(identifier.to_string());
        license
    });

    OpenApiBuilder::new().info(info).build()
}

// Cargo authors are `;` separated and may include "Name <email>".
fn cargo_contact() -> Option<Contact> {
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;

    let (name, email) = match primary.find('<') {
        Some(start) => (
            optional_str(&primary[..start]),
            optional_str(primary[start + 1..].trim_end_matches('>')),
        ),
        None => (optional_str(primary), None),
    };

    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn optional_str(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn cors(origin: Option<&str>) -> Result<CorsLayer> {
    let cors = CorsLayer::new().allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

    match origin {
        // credentials require an explicit origin and explicit headers
        Some(origin) => Ok(cors
            .allow_origin(
                origin
                    .parse::<HeaderValue>()
                    .context("invalid CORS_ORIGIN")?,
            )
            .allow_headers([
                CONTENT_TYPE,
                AUTHORIZATION,
                HeaderName::from_static(handlers::API_KEY_HEADER),
            ])
            .allow_credentials(true)),
        None => Ok(cors.allow_origin(Any).allow_headers(Any)),
    }
}

fn database(globals: &GlobalArgs) -> Result<Option<PgPool>> {
    let Some(dsn) = &globals.dsn else {
        return Ok(None);
    };

    // Connections are opened on first use so startup never blocks on Postgres.
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(2))
        .connect_lazy(dsn.expose_secret())
        .context("Invalid database connection string")?;

    Ok(Some(pool))
}

/// Assemble the full application: documented routes, aliases, Swagger UI and
/// the shared layers.
///
/// # Errors
/// Returns an error if the HTTP client, the database pool or the CORS layer
/// cannot be built.
pub fn app(globals: &GlobalArgs) -> Result<Router> {
    let supabase = Arc::new(Supabase::new(globals.supabase.clone())?);
    let pool = database(globals)?;

    let (router, openapi) = router().split_for_parts();

    let app = router
        .route("/api/user", get(session::me))
        .merge(SwaggerUi::new("/swagger-ui").url("/openapi.json", openapi))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID_HEADER),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID_HEADER,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors(globals.cors_origin.as_deref())?)
                .layer(Extension(supabase))
                .layer(Extension(ApiKey(globals.api_key.clone())))
                .layer(Extension(pool))
                .layer(axum::middleware::from_fn(supabase_middleware)),
        );

    Ok(app)
}

/// Serve the application until Ctrl-C or SIGTERM.
///
/// # Errors
/// Returns an error if the server fails to start
pub async fn new(port: u16, globals: &GlobalArgs) -> Result<()> {
    let app = app(globals)?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

// Headers are left out of the span: they carry session cookies.
fn make_span(request: &Request<Body>) -> Span {
    let method = request.method();
    let path = request.uri().path();
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", %method, path, request_id)
}
