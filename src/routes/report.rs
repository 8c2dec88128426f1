use axum::{routing::get, Router};

use crate::handlers::report;
use crate::routes::admin_only;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    let router = Router::new()
        .route("/summary", get(report::summary))
        .route("/revenue", get(report::revenue))
        .route("/enrollments", get(report::enrollments))
        .route("/recent-invoices", get(report::recent_invoices));

    admin_only(state, router)
}
