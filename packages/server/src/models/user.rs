use serde::{Deserialize, Serialize};

use super::shared::{Pagination, validate_email, validate_person_name, validate_username};
use crate::entity::role::Role;
use crate::error::AppError;

/// Public representation of a user account.
#[derive(Serialize, utoipa::ToSchema)]
pub struct UserResponse {
    #[schema(example = "alice")]
    pub username: String,
    #[schema(example = "alice@example.com")]
    pub email: String,
    #[schema(example = "Alice")]
    pub first_name: String,
    #[schema(example = "Liddell")]
    pub last_name: String,
    pub bio: String,
    pub role: Role,
}

impl From<crate::entity::user::Model> for UserResponse {
    fn from(m: crate::entity::user::Model) -> Self {
        Self {
            username: m.username,
            email: m.email,
            first_name: m.first_name,
            last_name: m.last_name,
            bio: m.bio,
            role: m.role,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UserListResponse {
    pub data: Vec<UserResponse>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct UserListQuery {
    /// Case-insensitive username substring.
    pub search: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Admin request to create a user.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub bio: String,
    /// Defaults to `user`.
    #[serde(default)]
    pub role: Role,
}

/// Admin PATCH of any user, role included.
#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Option<Role>,
}

/// Self-service PATCH of `/users/me`. There is no role field: a `role` key
/// in the body is ignored.
#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateMeRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
}

impl From<UpdateMeRequest> for UpdateUserRequest {
    fn from(req: UpdateMeRequest) -> Self {
        Self {
            username: req.username,
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            bio: req.bio,
            role: None,
        }
    }
}

pub fn validate_create_user(req: &CreateUserRequest) -> Result<(), AppError> {
    validate_username(req.username.trim())?;
    validate_email(req.email.trim())?;
    validate_person_name("first_name", &req.first_name)?;
    validate_person_name("last_name", &req.last_name)?;
    Ok(())
}

pub fn validate_update_user(req: &UpdateUserRequest) -> Result<(), AppError> {
    if let Some(ref username) = req.username {
        validate_username(username.trim())?;
    }
    if let Some(ref email) = req.email {
        validate_email(email.trim())?;
    }
    if let Some(ref first_name) = req.first_name {
        validate_person_name("first_name", first_name)?;
    }
    if let Some(ref last_name) = req.last_name {
        validate_person_name("last_name", last_name)?;
    }
    Ok(())
}
