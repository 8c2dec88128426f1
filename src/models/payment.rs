use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::cart::CartItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
        }
    }

    /// The only legal move is pending -> completed.
    pub fn can_become(self, next: PaymentStatus) -> bool {
        matches!((self, next), (PaymentStatus::Pending, PaymentStatus::Completed))
    }
}

/// A checkout attempt, keyed by the gateway reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(rename = "_id")]
    pub reference: String,
    pub user_id: String,
    pub email: String,
    pub amount: f64,
    pub currency: String,
    pub status: PaymentStatus,

    #[serde(default)]
    pub cart_items: Vec<CartItem>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_code: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new_pending(
        reference: String,
        user_id: String,
        email: String,
        amount: f64,
        currency: String,
        cart_items: Vec<CartItem>,
    ) -> Self {
        let now = Utc::now();
        Payment {
            reference,
            user_id,
            email,
            amount,
            currency,
            status: PaymentStatus::Pending,
            cart_items,
            authorization_url: None,
            access_code: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }
}
