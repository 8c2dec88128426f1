use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use mongodb::bson::doc;
use mongodb::Collection;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::handlers::auth::load_user;
use crate::handlers::cart::{load_cart, price_checkout};
use crate::models::cart::{cart_total, CartItem};
use crate::models::invoice::Invoice;
use crate::models::payment::Payment;
use crate::models::user::Claims;
use crate::services::payment_service::{CheckoutRequest, CheckoutSession, VerificationOutcome};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InitializePaymentRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,

    /// Defaults to the full cart total.
    #[validate(range(exclusive_min = 0.0, message = "Amount must be greater than 0"))]
    pub amount: Option<f64>,

    pub reference: Option<String>,

    /// Falls back to the learner's saved cart when absent. Only ids and
    /// kinds are used; titles and prices are re-read from the catalogue.
    #[validate(nested)]
    pub cart_items: Option<Vec<CartItem>>,
}

#[derive(Debug, Serialize)]
pub struct InitializePaymentResponse {
    pub success: bool,
    pub data: CheckoutSession,
}

#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub status: &'static str,
    pub invoice: Invoice,
}

impl From<VerificationOutcome> for VerifyPaymentResponse {
    fn from(outcome: VerificationOutcome) -> Self {
        let status = match outcome {
            VerificationOutcome::Completed(_) => "completed",
            VerificationOutcome::AlreadyCompleted(_) => "already_completed",
        };
        VerifyPaymentResponse {
            success: true,
            status,
            invoice: outcome.into_invoice(),
        }
    }
}

pub async fn initialize_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<InitializePaymentRequest>,
) -> Result<Json<InitializePaymentResponse>> {
    payload.validate()?;
    let payments = state.payments()?;

    let requested = match payload.cart_items {
        Some(items) if !items.is_empty() => items,
        _ => load_cart(&state, &claims.sub).await?.items,
    };
    let user = load_user(&state, &claims.sub).await?;
    let cart_items = price_checkout(&state, &user, &requested).await?;
    let amount = payload.amount.unwrap_or_else(|| cart_total(&cart_items));

    let session = payments
        .initialize(CheckoutRequest {
            user_id: claims.sub.clone(),
            email: payload.email.unwrap_or(user.email),
            amount,
            reference: payload.reference,
            cart_items,
        })
        .await
        .map_err(|e| {
            tracing::error!("Payment initialization failed for {}: {}", claims.sub, e);
            e
        })?;

    Ok(Json(InitializePaymentResponse {
        success: true,
        data: session,
    }))
}

/// Public so the gateway callback page can confirm a payment without a session.
pub async fn verify_payment(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<VerifyPaymentResponse>> {
    let outcome = state.payments()?.verify(&reference).await?;
    if let VerificationOutcome::AlreadyCompleted(_) = &outcome {
        tracing::debug!("Repeat verification for {}, returning invoice {}", reference, outcome.invoice().reference);
    }
    Ok(Json(outcome.into()))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(reference): Path<String>,
) -> Result<Json<Payment>> {
    let payments: Collection<Payment> = state.db.collection("payments");
    let payment = payments
        .find_one(doc! { "_id": &reference })
        .await?
        .ok_or_else(|| AppError::not_found("Payment"))?;

    if !claims.is_admin() && payment.user_id != claims.sub {
        return Err(AppError::Unauthorized);
    }
    Ok(Json(payment))
}
