use axum::{extract::State, http::StatusCode, response::Json, Extension};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use mongodb::bson::doc;
use mongodb::Collection;
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::handlers::auth_otp::send_otp_mail;
use crate::middleware::auth::issue_token;
use crate::models::otp::OtpPurpose;
use crate::models::parse_object_id;
use crate::models::user::{AuthResponse, Claims, CreateUser, LoginUser, Role, User, UserResponse};
use crate::state::AppState;

pub(crate) async fn load_user(state: &AppState, user_id: &str) -> Result<User> {
    let id = parse_object_id(user_id, "User")?;
    let collection: Collection<User> = state.db.collection("users");
    collection
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<CreateUser>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    payload.validate()?;

    let collection: Collection<User> = state.db.collection("users");
    let email = payload.email.trim().to_lowercase();

    if collection.find_one(doc! { "email": &email }).await?.is_some() {
        return Err(AppError::DuplicateKey("Email already registered".to_string()));
    }

    let role = if state.config.is_admin_email(&email) {
        Role::Admin
    } else {
        Role::Learner
    };

    let now = Utc::now();
    let mut user = User {
        id: None,
        full_name: payload.full_name.trim().to_string(),
        email,
        password_hash: hash(&payload.password, DEFAULT_COST)?,
        role,
        phone: payload.phone,
        email_verified: false,
        otp: None,
        invoices: Vec::new(),
        pending_payments: Vec::new(),
        enrolled_tracks: Vec::new(),
        enrolled_courses: Vec::new(),
        created_at: now,
        updated_at: now,
    };

    let inserted = collection.insert_one(&user).await?;
    let id = inserted
        .inserted_id
        .as_object_id()
        .ok_or_else(|| AppError::service("Inserted user has no ObjectId"))?;
    user.id = Some(id);

    tracing::info!("👤 Registered {} as {:?}", user.email, user.role);

    // Registration succeeds even if the verification mail does not go out.
    match state.otp_service.issue_otp(&id, OtpPurpose::VerifyEmail).await {
        Ok(code) => {
            if let Err(e) = send_otp_mail(&state, &user, &code, OtpPurpose::VerifyEmail).await {
                tracing::error!("Failed to send verification OTP to {}: {}", user.email, e);
            }
        }
        Err(e) => tracing::error!("Failed to issue verification OTP: {}", e),
    }

    let token = issue_token(&user, &state.config.jwt_secret)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: user.into(),
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginUser>,
) -> Result<Json<AuthResponse>> {
    payload.validate()?;

    let collection: Collection<User> = state.db.collection("users");
    let email = payload.email.trim().to_lowercase();

    let user = collection
        .find_one(doc! { "email": &email })
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !verify(&payload.password, &user.password_hash)? {
        return Err(AppError::InvalidCredentials);
    }

    let token = issue_token(&user, &state.config.jwt_secret)?;

    Ok(Json(AuthResponse {
        user: user.into(),
        token,
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserResponse>> {
    let user = load_user(&state, &claims.sub).await?;
    Ok(Json(user.into()))
}
