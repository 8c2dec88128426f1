use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::models::cart::{cart_total, CartItem};
use crate::models::payment::Payment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Paid,
    Unpaid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Unpaid => "unpaid",
        }
    }
}

/// Invoice keyed by the same reference as the payment it settles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    #[serde(rename = "_id")]
    pub reference: String,
    pub user_id: String,

    #[serde(default)]
    pub email: String,

    pub amount: f64,

    #[serde(default)]
    pub cart_total: f64,

    #[serde(default)]
    pub balance_due: f64,

    pub currency: String,
    pub status: InvoiceStatus,

    #[serde(default)]
    pub cart_items: Vec<CartItem>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paystack_response: Option<Value>,

    pub created_at: DateTime<Utc>,
}

impl Invoice {
    pub fn from_payment(payment: &Payment, paystack_response: Value, paid_at: DateTime<Utc>) -> Self {
        let total = cart_total(&payment.cart_items);
        Invoice {
            reference: payment.reference.clone(),
            user_id: payment.user_id.clone(),
            email: payment.email.clone(),
            amount: payment.amount,
            cart_total: total,
            balance_due: balance_due(total, payment.amount),
            currency: payment.currency.clone(),
            status: InvoiceStatus::Paid,
            cart_items: payment.cart_items.clone(),
            paid_at: Some(paid_at),
            paystack_response: Some(paystack_response),
            created_at: Utc::now(),
        }
    }
}

/// Outstanding amount after a (possibly partial) payment.
pub fn balance_due(cart_total: f64, paid: f64) -> f64 {
    let due = cart_total - paid;
    if due > 0.0 {
        (due * 100.0).round() / 100.0
    } else {
        0.0
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoice {
    pub reference: Option<String>,

    #[validate(length(min = 1, message = "User id is required"))]
    pub user_id: String,

    #[validate(email)]
    pub email: String,

    #[validate(range(min = 0.0, message = "Amount cannot be negative"))]
    pub amount: f64,

    pub currency: Option<String>,
    pub status: Option<InvoiceStatus>,

    #[serde(default)]
    #[validate(nested)]
    pub cart_items: Vec<CartItem>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvoice {
    #[validate(range(min = 0.0, message = "Amount cannot be negative"))]
    pub amount: Option<f64>,
    pub status: Option<InvoiceStatus>,

    #[validate(nested)]
    pub cart_items: Option<Vec<CartItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceQuery {
    pub user_id: Option<String>,
    pub status: Option<InvoiceStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cart::ItemType;

    fn payment_with(items: Vec<CartItem>, amount: f64) -> Payment {
        Payment::new_pending("CS-1".into(), "u1".into(), "a@b.co".into(), amount, "NGN".into(), items)
    }

    fn item(id: &str, price: f64) -> CartItem {
        CartItem { item_id: id.into(), item_type: ItemType::Course, title: id.into(), price }
    }

    #[test]
    fn test_invoice_carries_payment_reference() {
        let payment = payment_with(vec![item("c1", 1000.0)], 1000.0);
        let invoice = Invoice::from_payment(&payment, serde_json::json!({}), Utc::now());
        assert_eq!(invoice.reference, payment.reference);
        assert_eq!(invoice.status, InvoiceStatus::Paid);
    }

    #[test]
    fn test_cart_total_is_sum_of_item_prices() {
        let payment = payment_with(vec![item("c1", 1500.0), item("c2", 2500.0)], 4000.0);
        let invoice = Invoice::from_payment(&payment, serde_json::json!({}), Utc::now());
        assert_eq!(invoice.cart_total, 4000.0);
        assert_eq!(invoice.balance_due, 0.0);
    }

    #[test]
    fn test_partial_payment_leaves_balance() {
        let payment = payment_with(vec![item("c1", 1500.0), item("c2", 2500.0)], 1000.0);
        let invoice = Invoice::from_payment(&payment, serde_json::json!({}), Utc::now());
        assert_eq!(invoice.amount + invoice.balance_due, invoice.cart_total);
    }

    #[test]
    fn test_balance_never_negative() {
        assert_eq!(balance_due(100.0, 150.0), 0.0);
        assert_eq!(balance_due(100.0, 33.33), 66.67);
    }
}
