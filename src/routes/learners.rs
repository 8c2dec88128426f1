use axum::{routing::get, Router};

use crate::handlers::learners;
use crate::routes::admin_only;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    let router = Router::new()
        .route("/", get(learners::list_learners))
        .route(
            "/:id",
            get(learners::get_learner)
                .put(learners::update_learner)
                .delete(learners::delete_learner),
        );

    admin_only(state, router)
}
