use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{auth, auth_otp};
use crate::routes::authenticated;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        // Password reset
        .route("/forgot-password", post(auth_otp::forgot_password))
        .route("/verify-reset-otp", post(auth_otp::verify_reset_otp))
        .route("/reset-password", post(auth_otp::reset_password));

    let private = Router::new()
        .route("/me", get(auth::me))
        // Email verification
        .route("/send-otp", post(auth_otp::send_verification_otp))
        .route("/verify-otp", post(auth_otp::verify_email_otp));

    public.merge(authenticated(state, private))
}
