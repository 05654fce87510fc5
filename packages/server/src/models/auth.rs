use serde::{Deserialize, Serialize};

use super::shared::{validate_email, validate_username};
use crate::error::AppError;

/// Request body for signup.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct SignupRequest {
    /// Unique username (1-150 chars of letters, digits and `_.@+-`; `me` is reserved).
    #[schema(example = "alice")]
    pub username: String,
    /// Address the confirmation code is sent to.
    #[schema(example = "alice@example.com")]
    pub email: String,
}

pub fn validate_signup_request(payload: &SignupRequest) -> Result<(), AppError> {
    validate_username(payload.username.trim())?;
    validate_email(payload.email.trim())?;
    Ok(())
}

/// Echo of the accepted signup.
#[derive(Serialize, utoipa::ToSchema)]
pub struct SignupResponse {
    #[schema(example = "alice")]
    pub username: String,
    #[schema(example = "alice@example.com")]
    pub email: String,
}

impl From<crate::entity::user::Model> for SignupResponse {
    fn from(user: crate::entity::user::Model) -> Self {
        Self {
            username: user.username,
            email: user.email,
        }
    }
}

/// Request body for exchanging a confirmation code.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct TokenRequest {
    #[schema(example = "alice")]
    pub username: String,
    /// Code received by email.
    #[schema(example = "482913")]
    pub confirmation_code: String,
}

pub fn validate_token_request(payload: &TokenRequest) -> Result<(), AppError> {
    if payload.username.trim().is_empty() {
        return Err(AppError::field("username", "Username must not be empty"));
    }
    if payload.confirmation_code.trim().is_empty() {
        return Err(AppError::field(
            "confirmation_code",
            "Confirmation code must not be empty",
        ));
    }
    Ok(())
}

/// Access and refresh token pair.
#[derive(Serialize, utoipa::ToSchema)]
pub struct TokenPairResponse {
    /// Bearer token for API requests.
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub access: String,
    /// Token for obtaining a new access token.
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub refresh: String,
    #[schema(example = "Bearer")]
    pub token_type: &'static str,
}

/// Request body for refreshing an access token.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// A freshly issued access token.
#[derive(Serialize, utoipa::ToSchema)]
pub struct AccessTokenResponse {
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub access: String,
    #[schema(example = "Bearer")]
    pub token_type: &'static str,
}
