use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::Issue;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Registration payload.
#[derive(ToSchema, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i64>,
}

// Never print passwords, even at trace level.
impl std::fmt::Debug for CreateUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateUser")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("age", &self.age)
            .finish_non_exhaustive()
    }
}

impl CreateUser {
    /// Check every field and collect all issues.
    ///
    /// # Errors
    /// Returns the list of issues when any rule fails.
    pub fn validate(&self) -> Result<(), Vec<Issue>> {
        let mut issues = Vec::new();

        if self.name.trim().is_empty() {
            issues.push(Issue::new("name", "Name is required"));
        }

        if !valid_email(self.email.trim()) {
            issues.push(Issue::new("email", "Invalid email address"));
        }

        issues.extend(
            password_issues(&self.password)
                .into_iter()
                .map(|message| Issue::new("password", message)),
        );

        if self.password != self.confirm_password {
            issues.push(Issue::new("confirmPassword", "Passwords do not match"));
        }

        if self.age.is_some_and(|age| age <= 0) {
            issues.push(Issue::new("age", "Age must be a positive number"));
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PasswordChecks {
    long_enough: bool,
    uppercase: bool,
    lowercase: bool,
    digit: bool,
    special: bool,
}

impl PasswordChecks {
    fn new(password: &str) -> Self {
        Self {
            long_enough: password.chars().count() >= MIN_PASSWORD_LENGTH,
            uppercase: password.chars().any(|c| c.is_ascii_uppercase()),
            lowercase: password.chars().any(|c| c.is_ascii_lowercase()),
            digit: password.chars().any(|c| c.is_ascii_digit()),
            special: password.chars().any(|c| !c.is_ascii_alphanumeric()),
        }
    }

    fn score(self) -> u8 {
        [
            self.long_enough,
            self.uppercase,
            self.lowercase,
            self.digit,
            self.special,
        ]
        .into_iter()
        .map(u8::from)
        .sum()
    }
}

fn password_issues(password: &str) -> Vec<&'static str> {
    let checks = PasswordChecks::new(password);

    [
        (
            checks.long_enough,
            "Password must be at least 8 characters",
        ),
        (
            checks.uppercase,
            "Password must contain an uppercase letter",
        ),
        (checks.lowercase, "Password must contain a lowercase letter"),
        (checks.digit, "Password must contain a number"),
        (checks.special, "Password must contain a special character"),
    ]
    .into_iter()
    .filter(|(ok, _)| !ok)
    .map(|(_, message)| message)
    .collect()
}

/// Password strength from 0 to 5: one point each for length, uppercase,
/// lowercase, digit and any other character.
#[must_use]
pub fn password_strength(password: &str) -> u8 {
    if password.is_empty() {
        return 0;
    }
    PasswordChecks::new(password).score()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StrengthLabel {
    Weak,
    Medium,
    Strong,
}

impl StrengthLabel {
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        match score {
            0..=2 => Self::Weak,
            3..=4 => Self::Medium,
            _ => Self::Strong,
        }
    }
}
