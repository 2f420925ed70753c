//! Request schemas shared by the handlers and the typed client.

pub mod common;
pub use self::common::{ApiError, ApiResponse, Meta, Pagination};

pub mod user;
pub use self::user::{password_strength, CreateUser, StrengthLabel};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A single failed rule, addressed by the JSON field it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Issue {
    pub path: String,
    pub message: String,
}

impl Issue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}
