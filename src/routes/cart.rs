use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::handlers::cart;
use crate::routes::authenticated;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    let router = Router::new()
        .route("/", get(cart::get_cart).delete(cart::clear_cart))
        .route("/items", post(cart::add_item))
        .route("/items/:item_id", delete(cart::remove_item));

    authenticated(state, router)
}
