use axum::{
    extract::FromRequestParts,
    http::{Method, request::Parts},
};
use sea_orm::EntityTrait;

use crate::entity::{role::Role, user};
use crate::error::AppError;
use crate::policy::{self, Requester};
use crate::state::AppState;
use crate::utils::jwt::{self, TokenKind};

/// Authenticated user extracted from the `Authorization: Bearer <token>` header.
///
/// Add this as a handler parameter to require authentication. A request
/// without a valid access token is rejected with 401 before the handler
/// runs, which is the whole check for posting reviews and comments and for
/// `/users/me`. The role is read from the user row, not from the token, so
/// role changes and account deletion take effect on the next request.
pub struct AuthUser {
    pub user_id: i32,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    pub fn requester(&self) -> Requester {
        Requester {
            user_id: self.user_id,
            role: self.role,
        }
    }

    /// Catalog writes (categories, genres, titles).
    pub fn require_admin_or_read_only(&self, method: &Method) -> Result<(), AppError> {
        allow(policy::admin_or_read_only(method, Some(self.requester())))
    }

    /// Editing or deleting a review or comment written by `author_id`.
    pub fn require_author_or_staff(&self, method: &Method, author_id: i32) -> Result<(), AppError> {
        allow(policy::author_or_staff_or_read_only(
            method,
            Some(self.requester()),
            author_id,
        ))
    }

    /// Any operation under `/users` other than `/users/me`.
    pub fn require_user_admin(&self) -> Result<(), AppError> {
        allow(policy::manage_users(Some(self.requester())))
    }
}

fn allow(allowed: bool) -> Result<(), AppError> {
    if allowed {
        Ok(())
    } else {
        Err(AppError::PermissionDenied)
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::TokenMissing)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::TokenInvalid)?;

        let claims = jwt::verify(token, TokenKind::Access, &state.config.auth.jwt_secret)
            .map_err(|_| AppError::TokenInvalid)?;

        let user = user::Entity::find_by_id(claims.uid)
            .one(&state.db)
            .await?
            .ok_or(AppError::TokenInvalid)?;

        Ok(AuthUser {
            user_id: user.id,
            username: user.username,
            role: user.role,
        })
    }
}
