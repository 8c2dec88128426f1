use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::errors::{AppError, Result};
use crate::models::user::{Claims, User};
use crate::state::AppState;

const TOKEN_TTL_SECS: i64 = 86400; // 24 hours

pub fn issue_token(user: &User, secret: &str) -> Result<String> {
    let id = user
        .id
        .ok_or_else(|| AppError::service("User has no id"))?;

    let claims = Claims {
        sub: id.to_hex(),
        email: user.email.clone(),
        role: user.role,
        exp: (Utc::now().timestamp() + TOKEN_TTL_SECS) as usize,
    };

    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?)
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::AuthError)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let token = bearer_token(&headers).ok_or(AppError::AuthError)?;
    let claims = decode_token(token, &state.config.jwt_secret)?;

    // Insert claims into request extensions
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Layered inside `auth_middleware`, so claims are already present.
pub async fn require_admin(request: Request, next: Next) -> Result<Response> {
    let is_admin = request
        .extensions()
        .get::<Claims>()
        .map(Claims::is_admin)
        .unwrap_or(false);

    if !is_admin {
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}
