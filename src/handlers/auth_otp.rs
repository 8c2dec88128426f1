use axum::{extract::State, Extension, Json};
use bcrypt::{hash, DEFAULT_COST};
use mongodb::{bson::doc, Collection};
use validator::Validate;

use crate::dtos::auth_dtos::{
    ForgotPasswordRequest, MessageResponse, ResetPasswordRequest, ResetTokenResponse,
    VerifyEmailRequest, VerifyResetOtpRequest,
};
use crate::errors::{AppError, Result};
use crate::handlers::auth::load_user;
use crate::models::otp::OtpPurpose;
use crate::models::user::{Claims, User};
use crate::models::{parse_object_id, timestamp};
use crate::state::AppState;

pub(crate) async fn send_otp_mail(
    state: &AppState,
    user: &User,
    code: &str,
    purpose: OtpPurpose,
) -> Result<()> {
    match &state.mail_service {
        Some(mail) => mail.send_otp(&user.email, &user.full_name, code, purpose).await,
        None if !state.config.is_production() => {
            tracing::warn!("Mail not configured, OTP for {} is {}", user.email, code);
            Ok(())
        }
        None => Err(AppError::unavailable("Mail delivery is not configured")),
    }
}

// 1. Send email verification OTP
pub async fn send_verification_otp(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MessageResponse>> {
    let user = load_user(&state, &claims.sub).await?;
    if user.email_verified {
        return Ok(Json(MessageResponse::ok("Email already verified")));
    }

    let id = parse_object_id(&claims.sub, "User")?;
    let code = state.otp_service.issue_otp(&id, OtpPurpose::VerifyEmail).await?;
    send_otp_mail(&state, &user, &code, OtpPurpose::VerifyEmail).await?;

    Ok(Json(MessageResponse::ok(format!("OTP sent to {}", user.email))))
}

// 2. Verify email with OTP
pub async fn verify_email_otp(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<VerifyEmailRequest>,
) -> Result<Json<MessageResponse>> {
    req.validate()?;
    let id = parse_object_id(&claims.sub, "User")?;

    if !state
        .otp_service
        .verify_user_otp(&id, &req.otp, OtpPurpose::VerifyEmail)
        .await?
    {
        return Err(AppError::InvalidOtp);
    }

    let users: Collection<User> = state.db.collection("users");
    users
        .update_one(
            doc! { "_id": id },
            doc! { "$set": { "emailVerified": true, "updatedAt": timestamp() } },
        )
        .await?;

    Ok(Json(MessageResponse::ok("Email verified successfully")))
}

// 3. Forgot password - request OTP
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    req.validate()?;

    let users: Collection<User> = state.db.collection("users");
    let user = users
        .find_one(doc! { "email": req.email.trim().to_lowercase() })
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    let id = user.id.ok_or_else(|| AppError::service("User has no id"))?;
    let code = state.otp_service.issue_otp(&id, OtpPurpose::ResetPassword).await?;
    send_otp_mail(&state, &user, &code, OtpPurpose::ResetPassword).await?;

    Ok(Json(MessageResponse::ok("OTP sent to your email")))
}

// 4. Verify reset OTP, hand out a short-lived reset token
pub async fn verify_reset_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyResetOtpRequest>,
) -> Result<Json<ResetTokenResponse>> {
    req.validate()?;

    let users: Collection<User> = state.db.collection("users");
    let user = users
        .find_one(doc! { "email": req.email.trim().to_lowercase() })
        .await?
        .ok_or(AppError::InvalidOtp)?;
    let id = user.id.ok_or_else(|| AppError::service("User has no id"))?;

    if !state
        .otp_service
        .verify_user_otp(&id, &req.otp, OtpPurpose::ResetPassword)
        .await?
    {
        return Err(AppError::InvalidOtp);
    }

    let reset_token = state
        .otp_service
        .generate_reset_token(&id.to_hex(), &user.password_hash)?;
    Ok(Json(ResetTokenResponse {
        success: true,
        reset_token,
    }))
}

// 5. Reset password with a verified reset token
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    req.validate()?;

    let grant = state.otp_service.decode_reset_token(&req.reset_token)?;
    let user = load_user(&state, &grant.user_id).await?;
    if !grant.matches(&user.password_hash) {
        return Err(AppError::AuthError);
    }

    let id = parse_object_id(&grant.user_id, "User")?;
    let password_hash = hash(&req.new_password, DEFAULT_COST)?;

    // Filtering on the old hash makes a token good for one reset only.
    let users: Collection<User> = state.db.collection("users");
    let result = users
        .update_one(
            doc! { "_id": id, "passwordHash": &user.password_hash },
            doc! {
                "$set": { "passwordHash": password_hash, "updatedAt": timestamp() },
                "$unset": { "otp": "" },
            },
        )
        .await?;

    if result.matched_count == 0 {
        return Err(AppError::AuthError);
    }

    tracing::info!("🔑 Password reset for {}", user.email);
    Ok(Json(MessageResponse::ok("Password reset successful")))
}
