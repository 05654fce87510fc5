use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which half of a token pair a JWT is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT Claims structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Username
    pub uid: i32,    // User ID
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64, // Expiration timestamp
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("expected a {expected:?} token")]
    WrongKind { expected: TokenKind },
    #[error("token lifetime out of range")]
    Lifetime,
}

/// Sign a new JWT token for a user.
pub fn sign(
    user_id: i32,
    username: &str,
    kind: TokenKind,
    ttl: Duration,
    secret: &str,
) -> Result<String, TokenError> {
    let now = Utc::now();
    let expiration = now.checked_add_signed(ttl).ok_or(TokenError::Lifetime)?;

    let claims = Claims {
        sub: username.to_owned(),
        uid: user_id,
        kind,
        iat: now.timestamp(),
        exp: expiration.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Verify and decode a JWT token of the given kind.
pub fn verify(token: &str, kind: TokenKind, secret: &str) -> Result<Claims, TokenError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    if token_data.claims.kind != kind {
        return Err(TokenError::WrongKind { expected: kind });
    }
    Ok(token_data.claims)
}
