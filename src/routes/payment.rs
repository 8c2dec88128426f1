use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::payment;
use crate::routes::authenticated;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    let public = Router::new().route("/verify/:reference", get(payment::verify_payment));

    let private = Router::new()
        .route("/initialize", post(payment::initialize_payment))
        .route("/:reference", get(payment::get_payment));

    public.merge(authenticated(state, private))
}
