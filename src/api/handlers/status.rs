//! Service status with an optional database probe.

use crate::GIT_COMMIT_HASH;
use axum::{
    extract::Extension,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, PgPool};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info_span, instrument, warn, Instrument};
use utoipa::ToSchema;

const STATUS_DB_TIMEOUT_SECONDS: u64 = 2;

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub status: String,
    pub name: String,
    pub version: String,
    pub commit: String,
    /// `ok`, `error`, or `disabled` when no database is configured
    pub database: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Database {
    Disabled,
    Healthy,
    Unhealthy,
}

impl Database {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Healthy => "ok",
            Self::Unhealthy => "error",
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/status",
    responses (
        (status = 200, description = "Service is up", body = Status),
        (status = 503, description = "Database connection is unhealthy", body = Status)
    ),
    tag = "status",
)]
#[instrument(skip(pool))]
pub async fn status(pool: Extension<Option<PgPool>>) -> impl IntoResponse {
    let database = match pool.0.as_ref() {
        Some(pool) => probe(pool).await,
        None => Database::Disabled,
    };

    let healthy = database != Database::Unhealthy;

    let status = Status {
        status: if healthy { "ok" } else { "error" }.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: GIT_COMMIT_HASH.to_string(),
        database: database.as_str().to_string(),
    };

    let headers = x_app_header(&status);

    if healthy {
        (StatusCode::OK, headers, Json(status))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, headers, Json(status))
    }
}

fn x_app_header(status: &Status) -> HeaderMap {
    let short_hash = if status.commit.len() > 7 {
        &status.commit[0..7]
    } else {
        ""
    };

    format!("{}:{}:{}", status.name, status.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            debug!("X-App header: {:?}", x_app_header_value);

            let mut headers = HeaderMap::new();
            headers.insert("X-App", x_app_header_value);
            headers
        })
        .map_err(|err| {
            debug!("Failed to parse X-App header: {}", err);
        })
        .unwrap_or_else(|()| HeaderMap::new())
}

async fn probe(pool: &PgPool) -> Database {
    let result = timeout(Duration::from_secs(STATUS_DB_TIMEOUT_SECONDS), async {
        match pool.acquire().await {
            Ok(mut conn) => {
                let ping_span =
                    info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
                match conn.ping().instrument(ping_span).await {
                    Ok(()) => Database::Healthy,
                    Err(err) => {
                        error!("Failed to ping database: {}", err);
                        Database::Unhealthy
                    }
                }
            }
            Err(err) => {
                error!("Failed to acquire database connection: {}", err);
                Database::Unhealthy
            }
        }
    })
    .await;

    result.unwrap_or_else(|_| {
        warn!("Database status check timed out");
        Database::Unhealthy
    })
}
