use axum::{
    routing::{get, put},
    Router,
};

use crate::handlers::invoices;
use crate::routes::{admin_only, authenticated};
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    // Owners may read their own invoice by reference; the handler checks.
    let learner = Router::new()
        .route("/mine", get(invoices::my_invoices))
        .route("/:reference", get(invoices::get_invoice));

    let admin = Router::new()
        .route("/", get(invoices::list_invoices).post(invoices::create_invoice))
        .route(
            "/:reference",
            put(invoices::update_invoice).delete(invoices::delete_invoice),
        );

    authenticated(state, learner).merge(admin_only(state, admin))
}
