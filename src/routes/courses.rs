use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::handlers::{courses, upload};
use crate::routes::admin_only;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/", get(courses::list_courses))
        .route("/:id", get(courses::get_course));

    let admin = Router::new()
        .route("/", post(courses::create_course))
        .route("/:id", put(courses::update_course).delete(courses::delete_course))
        .route(
            "/:id/image",
            post(upload::upload_course_image).layer(DefaultBodyLimit::max(upload::UPLOAD_BODY_LIMIT)),
        );

    public.merge(admin_only(state, admin))
}
