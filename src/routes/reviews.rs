use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::reviews;
use crate::routes::authenticated;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    let public = Router::new().route("/course/:course_id", get(reviews::list_course_reviews));
    let private = Router::new().route("/", post(reviews::create_review));

    public.merge(authenticated(state, private))
}
