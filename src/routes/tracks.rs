use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::handlers::{tracks, upload};
use crate::routes::admin_only;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/", get(tracks::list_tracks))
        .route("/:id", get(tracks::get_track))
        .route("/:id/courses", get(tracks::get_track_courses));

    let admin = Router::new()
        .route("/", post(tracks::create_track))
        .route("/:id", put(tracks::update_track).delete(tracks::delete_track))
        .route(
            "/:id/image",
            post(upload::upload_track_image).layer(DefaultBodyLimit::max(upload::UPLOAD_BODY_LIMIT)),
        );

    public.merge(admin_only(state, admin))
}
