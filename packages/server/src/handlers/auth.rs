use axum::{Json, extract::State};
use chrono::Utc;
use sea_orm::prelude::Expr;
use sea_orm::*;
use tracing::{info, instrument};

use crate::config::AuthConfig;
use crate::entity::{confirmation_code, role::Role, user};
use crate::error::{AppError, ErrorBody};
use crate::extractors::input::AppJson;
use crate::mailer::Message;
use crate::models::auth::{
    AccessTokenResponse, RefreshRequest, SignupRequest, SignupResponse, TokenPairResponse,
    TokenRequest, validate_signup_request, validate_token_request,
};
use crate::state::AppState;
use crate::utils::jwt::{self, TokenKind};
use crate::utils::{code, hash};

const TOKEN_TYPE: &str = "Bearer";

#[utoipa::path(
    post,
    path = "/signup",
    tag = "Auth",
    operation_id = "signup",
    summary = "Register and receive a confirmation code by email",
    description = "Creates an unconfirmed user and emails a single-use confirmation code. If a user with exactly this username and email already exists, a fresh code is issued instead and any earlier code stops working. The username `me` is reserved in any letter case.",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Code sent", body = SignupResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 409, description = "Username or email belongs to another account (USERNAME_TAKEN, EMAIL_TAKEN)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn signup(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SignupRequest>,
) -> Result<Json<SignupResponse>, AppError> {
    validate_signup_request(&payload)?;

    let username = payload.username.trim();
    let email = payload.email.trim();

    let txn = state.db.begin().await?;
    let user = find_or_create_signup_user(&txn, username, email).await?;

    let code = code::generate_code();
    let code_hash = hash::hash_secret(&code)
        .map_err(|e| AppError::Internal(format!("Code hash error: {}", e)))?;
    let now = Utc::now();

    // Only the newest code is ever valid.
    confirmation_code::Entity::delete_many()
        .filter(confirmation_code::Column::UserId.eq(user.id))
        .filter(confirmation_code::Column::ConsumedAt.is_null())
        .exec(&txn)
        .await?;

    confirmation_code::ActiveModel {
        user_id: Set(user.id),
        code_hash: Set(code_hash),
        expires_at: Set(now + state.config.auth.code_ttl()),
        consumed_at: Set(None),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    state
        .mailer
        .send(Message::confirmation_code(
            &state.config.mail.from,
            &user.email,
            &user.username,
            &code,
        ))
        .await?;

    info!(user_id = user.id, "Confirmation code issued");
    Ok(Json(SignupResponse::from(user)))
}

async fn find_or_create_signup_user(
    txn: &DatabaseTransaction,
    username: &str,
    email: &str,
) -> Result<user::Model, AppError> {
    if let Some(existing) = user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(txn)
        .await?
    {
        return if existing.email == email {
            Ok(existing)
        } else {
            Err(AppError::UsernameTaken)
        };
    }

    let email_taken = user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .count(txn)
        .await?
        > 0;
    if email_taken {
        return Err(AppError::EmailTaken);
    }

    let new_user = user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(email.to_string()),
        role: Set(Role::User),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        bio: Set(String::new()),
        is_confirmed: Set(false),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    new_user.insert(txn).await.map_err(user_conflict)
}

/// Map a unique violation on the user table to the field that collided.
pub(crate) fn user_conflict(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) if detail.contains("email") => {
            AppError::EmailTaken
        }
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::UsernameTaken,
        _ => AppError::from(err),
    }
}

#[utoipa::path(
    post,
    path = "/token",
    tag = "Auth",
    operation_id = "obtainToken",
    summary = "Exchange a confirmation code for tokens",
    description = "Verifies the newest unexpired confirmation code of the user and returns an access/refresh token pair. Each code works once.",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token pair issued", body = TokenPairResponse),
        (status = 400, description = "Wrong, expired or used code (INVALID_CONFIRMATION_CODE) or validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Unknown username (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn obtain_token(
    State(state): State<AppState>,
    AppJson(payload): AppJson<TokenRequest>,
) -> Result<Json<TokenPairResponse>, AppError> {
    validate_token_request(&payload)?;

    let user = user::Entity::find()
        .filter(user::Column::Username.eq(payload.username.trim()))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let now = Utc::now();
    let candidate = confirmation_code::Entity::find()
        .filter(confirmation_code::Column::UserId.eq(user.id))
        .filter(confirmation_code::Column::ConsumedAt.is_null())
        .filter(confirmation_code::Column::ExpiresAt.gt(now))
        .order_by_desc(confirmation_code::Column::Id)
        .one(&state.db)
        .await?
        .ok_or(AppError::InvalidConfirmationCode)?;

    let is_valid = hash::verify_secret(payload.confirmation_code.trim(), &candidate.code_hash)
        .map_err(|e| AppError::Internal(format!("Code verify error: {}", e)))?;
    if !is_valid {
        return Err(AppError::InvalidConfirmationCode);
    }

    // Conditional update: of two concurrent exchanges only one spends the code.
    let spent = confirmation_code::Entity::update_many()
        .col_expr(confirmation_code::Column::ConsumedAt, Expr::value(now))
        .filter(confirmation_code::Column::Id.eq(candidate.id))
        .filter(confirmation_code::Column::ConsumedAt.is_null())
        .exec(&state.db)
        .await?;
    if spent.rows_affected != 1 {
        return Err(AppError::InvalidConfirmationCode);
    }

    let user = if user.is_confirmed {
        user
    } else {
        let mut active: user::ActiveModel = user.into();
        active.is_confirmed = Set(true);
        active.update(&state.db).await?
    };

    info!(user_id = user.id, "Token pair issued");
    Ok(Json(issue_token_pair(&state.config.auth, &user)?))
}

#[utoipa::path(
    post,
    path = "/token/refresh",
    tag = "Auth",
    operation_id = "refreshToken",
    summary = "Exchange a refresh token for a new access token",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Access token issued", body = AccessTokenResponse),
        (status = 401, description = "Invalid, expired or non-refresh token (TOKEN_INVALID)", body = ErrorBody),
    ),
)]
#[instrument(skip_all)]
pub async fn refresh_token(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RefreshRequest>,
) -> Result<Json<AccessTokenResponse>, AppError> {
    let auth = &state.config.auth;
    let claims = jwt::verify(&payload.refresh, TokenKind::Refresh, &auth.jwt_secret)
        .map_err(|_| AppError::TokenInvalid)?;

    let user = user::Entity::find_by_id(claims.uid)
        .one(&state.db)
        .await?
        .ok_or(AppError::TokenInvalid)?;

    let access = sign(auth, &user, TokenKind::Access)?;
    Ok(Json(AccessTokenResponse {
        access,
        token_type: TOKEN_TYPE,
    }))
}

fn issue_token_pair(auth: &AuthConfig, user: &user::Model) -> Result<TokenPairResponse, AppError> {
    Ok(TokenPairResponse {
        access: sign(auth, user, TokenKind::Access)?,
        refresh: sign(auth, user, TokenKind::Refresh)?,
        token_type: TOKEN_TYPE,
    })
}

fn sign(auth: &AuthConfig, user: &user::Model, kind: TokenKind) -> Result<String, AppError> {
    let ttl = match kind {
        TokenKind::Access => auth.access_ttl(),
        TokenKind::Refresh => auth.refresh_ttl(),
    };
    jwt::sign(user.id, &user.username, kind, ttl, &auth.jwt_secret)
        .map_err(|e| AppError::Internal(format!("JWT sign error: {}", e)))
}
