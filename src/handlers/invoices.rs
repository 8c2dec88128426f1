use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use chrono::Utc;
use futures_util::TryStreamExt;
use mongodb::bson::doc;
use mongodb::Collection;
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::models::cart::cart_total;
use crate::models::invoice::{balance_due, CreateInvoice, Invoice, InvoiceQuery, InvoiceStatus, UpdateInvoice};
use crate::models::user::{Claims, User};
use crate::models::{parse_object_id, timestamp};
use crate::services::payment_service::generate_reference;
use crate::state::AppState;

fn invoices(state: &AppState) -> Collection<Invoice> {
    state.db.collection("invoices")
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<InvoiceQuery>,
) -> Result<Json<Vec<Invoice>>> {
    let mut filter = doc! {};
    if let Some(user_id) = &query.user_id {
        filter.insert("userId", user_id);
    }
    if let Some(status) = query.status {
        filter.insert("status", status.as_str());
    }

    let cursor = invoices(&state).find(filter).sort(doc! { "createdAt": -1 }).await?;
    Ok(Json(cursor.try_collect().await?))
}

pub async fn my_invoices(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Invoice>>> {
    let cursor = invoices(&state)
        .find(doc! { "userId": &claims.sub })
        .sort(doc! { "createdAt": -1 })
        .await?;
    Ok(Json(cursor.try_collect().await?))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(reference): Path<String>,
) -> Result<Json<Invoice>> {
    let invoice = invoices(&state)
        .find_one(doc! { "_id": &reference })
        .await?
        .ok_or_else(|| AppError::not_found("Invoice"))?;

    if !claims.is_admin() && invoice.user_id != claims.sub {
        return Err(AppError::Unauthorized);
    }
    Ok(Json(invoice))
}

pub async fn create_invoice(
    State(state): State<AppState>,
    Json(payload): Json<CreateInvoice>,
) -> Result<(StatusCode, Json<Invoice>)> {
    payload.validate()?;
    let user_id = parse_object_id(&payload.user_id, "User")?;

    let status = payload.status.unwrap_or(InvoiceStatus::Unpaid);
    let total = cart_total(&payload.cart_items);
    let now = Utc::now();

    let invoice = Invoice {
        reference: payload
            .reference
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(generate_reference),
        user_id: payload.user_id,
        email: payload.email.trim().to_lowercase(),
        amount: payload.amount,
        cart_total: total,
        balance_due: balance_due(total, payload.amount),
        currency: payload.currency.unwrap_or_else(|| "NGN".to_string()),
        status,
        cart_items: payload.cart_items,
        paid_at: (status == InvoiceStatus::Paid).then_some(now),
        paystack_response: None,
        created_at: now,
    };

    invoices(&state).insert_one(&invoice).await?;

    let users: Collection<User> = state.db.collection("users");
    let linked = users
        .update_one(
            doc! { "_id": user_id },
            doc! {
                "$addToSet": { "invoices": &invoice.reference },
                "$set": { "updatedAt": timestamp() },
            },
        )
        .await?;
    if linked.matched_count == 0 {
        tracing::warn!("Manual invoice {} has no matching user", invoice.reference);
    }

    tracing::info!("🧾 Created manual invoice {}", invoice.reference);
    Ok((StatusCode::CREATED, Json(invoice)))
}

fn apply_invoice_update(invoice: &mut Invoice, update: UpdateInvoice) {
    if let Some(items) = update.cart_items {
        invoice.cart_total = cart_total(&items);
        invoice.cart_items = items;
    }
    if let Some(amount) = update.amount {
        invoice.amount = amount;
    }
    if let Some(status) = update.status {
        if status == InvoiceStatus::Paid && invoice.paid_at.is_none() {
            invoice.paid_at = Some(Utc::now());
        }
        if status == InvoiceStatus::Unpaid {
            invoice.paid_at = None;
        }
        invoice.status = status;
    }
    invoice.balance_due = balance_due(invoice.cart_total, invoice.amount);
}

pub async fn update_invoice(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Json(payload): Json<UpdateInvoice>,
) -> Result<Json<Invoice>> {
    payload.validate()?;

    let collection = invoices(&state);
    let mut invoice = collection
        .find_one(doc! { "_id": &reference })
        .await?
        .ok_or_else(|| AppError::not_found("Invoice"))?;

    apply_invoice_update(&mut invoice, payload);
    collection.replace_one(doc! { "_id": &reference }, &invoice).await?;

    Ok(Json(invoice))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<StatusCode> {
    let collection = invoices(&state);
    let invoice = collection
        .find_one_and_delete(doc! { "_id": &reference })
        .await?
        .ok_or_else(|| AppError::not_found("Invoice"))?;

    if let Ok(user_id) = parse_object_id(&invoice.user_id, "User") {
        let users: Collection<User> = state.db.collection("users");
        users
            .update_one(
                doc! { "_id": user_id },
                doc! { "$pull": { "invoices": &reference }, "$set": { "updatedAt": timestamp() } },
            )
            .await?;
    }

    tracing::info!("🗑️ Deleted invoice {}", reference);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cart::{CartItem, ItemType};

    fn invoice() -> Invoice {
        Invoice {
            reference: "CS-1".into(),
            user_id: "u1".into(),
            email: "a@b.co".into(),
            amount: 1000.0,
            cart_total: 3000.0,
            balance_due: 2000.0,
            currency: "NGN".into(),
            status: InvoiceStatus::Unpaid,
            cart_items: vec![],
            paid_at: None,
            paystack_response: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_marking_paid_sets_paid_at() {
        let mut inv = invoice();
        apply_invoice_update(
            &mut inv,
            UpdateInvoice { amount: Some(3000.0), status: Some(InvoiceStatus::Paid), cart_items: None },
        );
        assert_eq!(inv.status, InvoiceStatus::Paid);
        assert!(inv.paid_at.is_some());
        assert_eq!(inv.balance_due, 0.0);
    }

    #[test]
    fn test_new_items_recompute_totals() {
        let mut inv = invoice();
        let items = vec![CartItem {
            item_id: "c1".into(),
            item_type: ItemType::Course,
            title: "Rust".into(),
            price: 5000.0,
        }];
        apply_invoice_update(&mut inv, UpdateInvoice { amount: None, status: None, cart_items: Some(items) });
        assert_eq!(inv.cart_total, 5000.0);
        assert_eq!(inv.balance_due, 4000.0);
    }

    #[test]
    fn test_marking_unpaid_clears_paid_at() {
        let mut inv = invoice();
        inv.status = InvoiceStatus::Paid;
        inv.paid_at = Some(Utc::now());
        apply_invoice_update(&mut inv, UpdateInvoice { amount: None, status: Some(InvoiceStatus::Unpaid), cart_items: None });
        assert!(inv.paid_at.is_none());
    }
}
