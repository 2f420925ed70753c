use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::Issue;

pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    /// Page number, starting at 1
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page, at most 100
    #[serde(default = "default_limit")]
    pub limit: u32,
}

const fn default_page() -> u32 {
    1
}

const fn default_limit() -> u32 {
    10
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl Pagination {
    /// # Errors
    /// Returns the list of issues when page or limit is out of range.
    pub fn validate(&self) -> Result<(), Vec<Issue>> {
        let mut issues = Vec::new();

        if self.page == 0 {
            issues.push(Issue::new("page", "Page must be a positive number"));
        }

        if self.limit == 0 {
            issues.push(Issue::new("limit", "Limit must be a positive number"));
        } else if self.limit > MAX_PAGE_SIZE {
            issues.push(Issue::new("limit", "Limit must be at most 100"));
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl Meta {
    #[must_use]
    pub fn new(pagination: Pagination, total: u64) -> Self {
        Self {
            page: pagination.page,
            limit: pagination.limit,
            total,
            total_pages: total.div_ceil(u64::from(pagination.limit.max(1))),
        }
    }
}

/// Envelope shared by list and validation responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl<T> ApiResponse<T> {
    pub const fn ok(data: T, meta: Option<Meta>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta,
        }
    }

    pub fn error(code: &str, message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.to_string(),
                message: message.to_string(),
                issues: Vec::new(),
            }),
            meta: None,
        }
    }

    /// Validation failure; the first issue becomes the headline message.
    #[must_use]
    pub fn invalid(issues: Vec<Issue>) -> Self {
        let message = issues
            .first()
            .map_or_else(|| "Invalid request".to_string(), |i| i.message.clone());

        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: "VALIDATION_ERROR".to_string(),
                message,
                issues,
            }),
            meta: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pagination_defaults() -> serde_json::Result<()> {
        let pagination: Pagination = serde_json::from_value(json!({}))?;
        assert_eq!(pagination, Pagination::default());
        assert_eq!(pagination.validate(), Ok(()));
        Ok(())
    }

    #[test]
    fn pagination_bounds() {
        let too_big = Pagination {
            page: 1,
            limit: 101,
        };
        assert_eq!(
            too_big.validate(),
            Err(vec![Issue::new("limit", "Limit must be at most 100")])
        );

        let zero = Pagination { page: 0, limit: 0 };
        assert_eq!(zero.validate().map_err(|i| i.len()), Err(2));
    }

    #[test]
    fn meta_counts_pages() {
        let meta = Meta::new(Pagination { page: 2, limit: 10 }, 21);
        assert_eq!(meta.total_pages, 3);

        let empty = Meta::new(Pagination::default(), 0);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn envelope_shapes() -> serde_json::Result<()> {
        let ok = serde_json::to_value(ApiResponse::ok(vec![1, 2], None))?;
        assert_eq!(ok, json!({ "success": true, "data": [1, 2] }));

        let invalid = serde_json::to_value(ApiResponse::<()>::invalid(vec![Issue::new(
            "confirmPassword",
            "Passwords do not match",
        )]))?;
        assert_eq!(
            invalid,
            json!({
                "success": false,
                "error": {
                    "code": "VALIDATION_ERROR",
                    "message": "Passwords do not match",
                    "issues": [{ "path": "confirmPassword", "message": "Passwords do not match" }]
                }
            })
        );
        Ok(())
    }
}
