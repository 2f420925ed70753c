//! Registration and the admin user listing under `/api/v1/users`.

use crate::{
    api::{
        handlers::{ApiKey, ErrorMessage},
        middleware::SupabaseServer,
    },
    supabase::{
        auth::{AuthError, User},
        Supabase,
    },
    validation::{password_strength, ApiResponse, CreateUser, Meta, Pagination, StrengthLabel},
};
use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserCreated {
    pub user_id: Uuid,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub email: Option<String>,
    pub name: Option<String>,
    pub created_at: Option<String>,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        let name = user
            .user_metadata
            .get("name")
            .and_then(|name| name.as_str())
            .map(str::to_string);

        Self {
            id: user.id,
            email: user.email,
            name,
            created_at: user.created_at,
        }
    }
}

fn bad_request<T: Serialize>(body: ApiResponse<T>) -> Response {
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUser,
    responses (
        (status = 201, description = "User registered", body = UserCreated),
        (status = 400, description = "Invalid payload or rejected by the auth provider"),
        (status = 500, description = "Supabase is not configured or unreachable", body = ErrorMessage),
    ),
    tag = "users",
)]
/// Register a user with Supabase.
///
/// The payload is validated first; the provider is only called with a valid
/// payload. When the provider returns a session right away (auto-confirm),
/// the session cookies are set on the response.
#[instrument(skip_all)]
pub async fn create_user(
    SupabaseServer(client): SupabaseServer,
    payload: Option<Json<CreateUser>>,
) -> impl IntoResponse {
    let user: CreateUser = match payload {
        Some(Json(payload)) => payload,
        None => {
            return bad_request(ApiResponse::<()>::error(
                "VALIDATION_ERROR",
                "Missing or malformed payload",
            ))
        }
    };

    debug!("user: {:?}", user);

    if let Err(issues) = user.validate() {
        debug!("Rejected registration with {} issue(s)", issues.len());
        return bad_request(ApiResponse::<()>::invalid(issues));
    }

    let strength = StrengthLabel::from_score(password_strength(&user.password));
    debug!("Password strength: {:?}", strength);

    let email = user.email.trim().to_lowercase();

    match client
        .sign_up(&email, &user.password, user.name.trim())
        .await
    {
        Ok(created) => {
            info!("Registered user {}", created.id);
            (
                StatusCode::CREATED,
                Json(UserCreated {
                    user_id: created.id,
                }),
            )
                .into_response()
        }
        Err(err @ AuthError::Api { .. }) => {
            debug!("Sign-up rejected: {}", err);
            ErrorMessage::response(StatusCode::BAD_REQUEST, err.to_string())
        }
        Err(err) => {
            error!("Sign-up failed: {}", err);
            ErrorMessage::response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(
        Pagination,
        ("X-API-Key" = String, Header, description = "Static API key")
    ),
    responses (
        (status = 200, description = "Page of users with pagination metadata"),
        (status = 400, description = "Invalid pagination"),
        (status = 401, description = "Missing or invalid API key", body = ErrorMessage),
        (status = 500, description = "Supabase admin access is not configured", body = ErrorMessage),
    ),
    tag = "users",
)]
/// List users through the `GoTrue` admin API.
#[instrument(skip(headers, api_key, supabase))]
pub async fn list_users(
    headers: HeaderMap,
    api_key: Extension<ApiKey>,
    supabase: Extension<Arc<Supabase>>,
    pagination: Option<Query<Pagination>>,
) -> impl IntoResponse {
    if let Err(rejection) = api_key.check(&headers) {
        return rejection;
    }

    let Some(Query(pagination)) = pagination else {
        return bad_request(ApiResponse::<()>::error(
            "VALIDATION_ERROR",
            "Invalid pagination parameters",
        ));
    };

    if let Err(issues) = pagination.validate() {
        return bad_request(ApiResponse::<()>::invalid(issues));
    }

    let admin = match supabase.admin() {
        Ok(admin) => admin,
        Err(err) => {
            error!("{}", err);
            return ErrorMessage::response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
        }
    };

    match admin.list_users(pagination.page, pagination.limit).await {
        Ok(page) => {
            let meta = Meta::new(pagination, page.total);
            let users: Vec<UserSummary> = page.users.into_iter().map(UserSummary::from).collect();
            (StatusCode::OK, Json(ApiResponse::ok(users, Some(meta)))).into_response()
        }
        Err(err) => {
            error!("Failed to list users: {}", err);
            (
                StatusCode::BAD_GATEWAY,
                Json(ApiResponse::<()>::error("PROVIDER_ERROR", &err.to_string())),
            )
                .into_response()
        }
    }
}
