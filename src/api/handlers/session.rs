use crate::api::{handlers::ErrorMessage, middleware::SupabaseServer};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

pub const LOGGED_IN: &str = "You are logged in!";
pub const NOT_LOGGED_IN: &str = "You are not logged in.";

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

impl SessionStatus {
    #[must_use]
    pub fn logged_in(user_id: Uuid) -> Self {
        Self {
            message: LOGGED_IN.to_string(),
            user_id: Some(user_id),
        }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            message: NOT_LOGGED_IN.to_string(),
            user_id: None,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/users",
    responses (
        (status = 200, description = "Session state of the caller", body = SessionStatus),
        (status = 500, description = "Supabase is not configured or unreachable", body = ErrorMessage),
    ),
    tag = "session",
)]
/// Report whether the request carries a valid Supabase session.
///
/// Also served at `/api/user`.
#[instrument(skip_all)]
pub async fn me(SupabaseServer(client): SupabaseServer) -> impl IntoResponse {
    match client.get_user().await {
        Ok(Some(user)) => {
            debug!("Session belongs to {}", user.id);
            (StatusCode::OK, Json(SessionStatus::logged_in(user.id))).into_response()
        }
        Ok(None) => (StatusCode::OK, Json(SessionStatus::anonymous())).into_response(),
        Err(err) => {
            error!("Failed to resolve session user: {}", err);
            ErrorMessage::response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}
