use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AppError;

pub const DEFAULT_LIMIT: u64 = 20;
pub const MAX_LIMIT: u64 = 100;

/// Pagination metadata included in list responses.
#[derive(Serialize, utoipa::ToSchema)]
pub struct Pagination {
    /// Maximum number of items in this page.
    #[schema(example = 20)]
    pub limit: u64,
    /// Number of items skipped before this page.
    #[schema(example = 0)]
    pub offset: u64,
    /// Total number of matching items.
    #[schema(example = 47)]
    pub total: u64,
}

/// Plain `limit`/`offset` query for lists without filters.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct PageQuery {
    /// Page size (1-100, default 20).
    #[param(example = 20)]
    pub limit: Option<u64>,
    /// Items to skip (default 0).
    #[param(example = 0)]
    pub offset: Option<u64>,
}

/// Largest offset Postgres accepts as a BIGINT bind.
const MAX_OFFSET: u64 = i64::MAX as u64;

/// Normalize client-supplied `limit`/`offset`.
pub fn page_window(limit: Option<u64>, offset: Option<u64>) -> (u64, u64) {
    (
        limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        offset.unwrap_or(0).min(MAX_OFFSET),
    )
}

/// Escape LIKE wildcard characters in a search string.
pub fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Serde helper for PATCH semantics on nullable fields.
///
/// * JSON field absent  => `None`          (don't update)
/// * JSON field = null  => `Some(None)`    (set to NULL)
/// * JSON field = value => `Some(Some(v))` (set to value)
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

pub const NAME_MAX_CHARS: usize = 256;
pub const SLUG_MAX_CHARS: usize = 50;
pub const USERNAME_MAX_CHARS: usize = 150;
pub const EMAIL_MAX_CHARS: usize = 254;
pub const PERSON_NAME_MAX_CHARS: usize = 150;

/// Username that would shadow the `/users/me` route.
pub const RESERVED_USERNAME: &str = "me";

/// Validate a trimmed name (1-256 Unicode characters).
pub fn validate_name(name: &str) -> Result<(), AppError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > NAME_MAX_CHARS {
        return Err(AppError::field(
            "name",
            format!("Name must be 1-{NAME_MAX_CHARS} characters"),
        ));
    }
    Ok(())
}

/// Validate a slug against `[-a-zA-Z0-9_]{1,50}`.
pub fn validate_slug(slug: &str) -> Result<(), AppError> {
    let len = slug.chars().count();
    if len == 0 || len > SLUG_MAX_CHARS {
        return Err(AppError::field(
            "slug",
            format!("Slug must be 1-{SLUG_MAX_CHARS} characters"),
        ));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::field(
            "slug",
            "Slug may contain only latin letters, digits, hyphens and underscores",
        ));
    }
    Ok(())
}

/// Validate a review score (1-10 inclusive).
pub fn validate_score(score: i32) -> Result<(), AppError> {
    if !(1..=10).contains(&score) {
        return Err(AppError::field("score", "Score must be between 1 and 10"));
    }
    Ok(())
}

/// Validate a release year against the current calendar year.
pub fn validate_year(year: i32, current_year: i32) -> Result<(), AppError> {
    if year > current_year {
        return Err(AppError::field(
            "year",
            format!("Year must not be later than {current_year}"),
        ));
    }
    Ok(())
}

/// Validate a username: 1-150 characters of letters, digits and `_.@+-`,
/// and not the reserved `me` in any letter case.
pub fn validate_username(username: &str) -> Result<(), AppError> {
    let len = username.chars().count();
    if len == 0 || len > USERNAME_MAX_CHARS {
        return Err(AppError::field(
            "username",
            format!("Username must be 1-{USERNAME_MAX_CHARS} characters"),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-'))
    {
        return Err(AppError::field(
            "username",
            "Username may contain only letters, digits and _ . @ + -",
        ));
    }
    if username.to_lowercase() == RESERVED_USERNAME {
        return Err(AppError::field(
            "username",
            format!("Username '{username}' is reserved"),
        ));
    }
    Ok(())
}

/// Validate an email address: one `@`, non-empty local and domain parts,
/// a dot in the domain, no whitespace, at most 254 characters.
pub fn validate_email(email: &str) -> Result<(), AppError> {
    let invalid = || AppError::field("email", "Enter a valid email address");
    if email.chars().count() > EMAIL_MAX_CHARS || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
    {
        return Err(invalid());
    }
    Ok(())
}

/// Validate an optional first/last name.
pub fn validate_person_name(field: &'static str, value: &str) -> Result<(), AppError> {
    if value.chars().count() > PERSON_NAME_MAX_CHARS {
        return Err(AppError::field(
            field,
            format!("Must be at most {PERSON_NAME_MAX_CHARS} characters"),
        ));
    }
    Ok(())
}

/// Validate review or comment text (non-blank).
pub fn validate_text(text: &str) -> Result<(), AppError> {
    if text.trim().is_empty() {
        return Err(AppError::field("text", "Text must not be empty"));
    }
    Ok(())
}
