use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::{DateTime, Datelike, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::Collection;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::models::course::Course;
use crate::models::invoice::{Invoice, InvoiceStatus};
use crate::models::track::Track;
use crate::models::user::User;
use crate::state::AppState;

const DEFAULT_MONTHS: u32 = 12;
const MAX_MONTHS: u32 = 60;
const DEFAULT_RECENT: i64 = 5;
const MAX_RECENT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct RevenueQuery {
    pub months: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceTotals {
    pub invoice_count: usize,
    pub paid_count: usize,
    pub total_revenue: f64,
    pub outstanding_balance: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub learners: u64,
    pub tracks: u64,
    pub courses: u64,
    #[serde(flatten)]
    pub totals: InvoiceTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRevenue {
    /// `YYYY-MM`
    pub month: String,
    pub revenue: f64,
    pub invoices: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEnrollment {
    #[serde(rename = "_id")]
    pub track_id: String,
    pub learners: i64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Revenue is what learners actually paid; unpaid invoices only add to the balance.
pub fn invoice_totals(invoices: &[Invoice]) -> InvoiceTotals {
    let mut totals = InvoiceTotals {
        invoice_count: invoices.len(),
        ..Default::default()
    };

    for invoice in invoices {
        if invoice.status == InvoiceStatus::Paid {
            totals.paid_count += 1;
            totals.total_revenue += invoice.amount;
        }
        totals.outstanding_balance += invoice.balance_due;
    }

    totals.total_revenue = round2(totals.total_revenue);
    totals.outstanding_balance = round2(totals.outstanding_balance);
    totals
}

fn month_key(year: i32, month: u32) -> String {
    format!("{:04}-{:02}", year, month)
}

/// The last `months` calendar months ending with the month of `now`, oldest first.
/// Months without paid invoices are present with zero revenue.
pub fn monthly_revenue(invoices: &[Invoice], months: u32, now: DateTime<Utc>) -> Vec<MonthlyRevenue> {
    let mut series: Vec<MonthlyRevenue> = Vec::with_capacity(months as usize);
    let (mut year, mut month) = (now.year(), now.month());

    for _ in 0..months {
        series.push(MonthlyRevenue {
            month: month_key(year, month),
            revenue: 0.0,
            invoices: 0,
        });
        if month == 1 {
            year -= 1;
            month = 12;
        } else {
            month -= 1;
        }
    }
    series.reverse();

    for invoice in invoices.iter().filter(|i| i.status == InvoiceStatus::Paid) {
        let paid_at = invoice.paid_at.unwrap_or(invoice.created_at);
        let key = month_key(paid_at.year(), paid_at.month());
        if let Some(bucket) = series.iter_mut().find(|b| b.month == key) {
            bucket.revenue += invoice.amount;
            bucket.invoices += 1;
        }
    }

    for bucket in &mut series {
        bucket.revenue = round2(bucket.revenue);
    }
    series
}

async fn all_invoices(state: &AppState) -> Result<Vec<Invoice>> {
    let invoices: Collection<Invoice> = state.db.collection("invoices");
    Ok(invoices.find(doc! {}).await?.try_collect().await?)
}

async fn count<T: Send + Sync>(collection: &Collection<T>, filter: Document) -> Result<u64> {
    Ok(collection.count_documents(filter).await?)
}

pub async fn summary(State(state): State<AppState>) -> Result<Json<ReportSummary>> {
    let users: Collection<User> = state.db.collection("users");
    let tracks: Collection<Track> = state.db.collection("tracks");
    let courses: Collection<Course> = state.db.collection("courses");

    let (learners, tracks, courses, invoices) = futures::try_join!(
        count(&users, doc! { "role": "learner" }),
        count(&tracks, doc! {}),
        count(&courses, doc! {}),
        all_invoices(&state),
    )?;

    Ok(Json(ReportSummary {
        learners,
        tracks,
        courses,
        totals: invoice_totals(&invoices),
    }))
}

pub async fn revenue(
    State(state): State<AppState>,
    Query(query): Query<RevenueQuery>,
) -> Result<Json<Vec<MonthlyRevenue>>> {
    let months = query.months.unwrap_or(DEFAULT_MONTHS).clamp(1, MAX_MONTHS);
    let invoices = all_invoices(&state).await?;

    Ok(Json(monthly_revenue(&invoices, months, Utc::now())))
}

pub async fn enrollments(State(state): State<AppState>) -> Result<Json<Vec<TrackEnrollment>>> {
    let users: Collection<User> = state.db.collection("users");

    let pipeline: Vec<Document> = vec![
        doc! { "$match": { "role": "learner" } },
        doc! { "$unwind": "$enrolledTracks" },
        doc! { "$group": { "_id": "$enrolledTracks", "learners": { "$sum": 1_i64 } } },
        doc! { "$sort": { "learners": -1 } },
    ];

    let rows: Vec<Document> = users.aggregate(pipeline).await?.try_collect().await?;
    let enrollments = rows
        .into_iter()
        .filter_map(|row| match mongodb::bson::from_document::<TrackEnrollment>(row) {
            Ok(row) => Some(row),
            Err(e) => {
                tracing::warn!("Skipping malformed enrollment row: {}", e);
                None
            }
        })
        .collect();

    Ok(Json(enrollments))
}

pub async fn recent_invoices(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<Invoice>>> {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT).clamp(1, MAX_RECENT);
    let invoices: Collection<Invoice> = state.db.collection("invoices");

    let cursor = invoices
        .find(doc! {})
        .sort(doc! { "createdAt": -1 })
        .limit(limit)
        .await?;
    Ok(Json(cursor.try_collect().await?))
}
