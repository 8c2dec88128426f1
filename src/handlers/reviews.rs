use axum::{
    extract::{Path, State},
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
use crate::handlers::auth::load_user;
use crate::models::course::Course;
use crate::models::parse_object_id;
use crate::models::review::{CourseReviews, CreateReview, Review};
use crate::models::user::Claims;
use crate::state::AppState;

fn reviews(state: &AppState) -> Collection<Review> {
    state.db.collection("reviews")
}

pub async fn list_course_reviews(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<Json<CourseReviews>> {
    let cursor = reviews(&state)
        .find(doc! { "courseId": &course_id })
        .sort(doc! { "createdAt": -1 })
        .await?;
    let reviews: Vec<Review> = cursor.try_collect().await?;

    Ok(Json(CourseReviews::new(course_id, reviews)))
}

/// Only learners enrolled in the course (directly or through its track) may review it.
pub async fn create_review(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateReview>,
) -> Result<(StatusCode, Json<Review>)> {
    payload.validate()?;

    let course_id = parse_object_id(&payload.course_id, "Course")?;
    let courses: Collection<Course> = state.db.collection("courses");
    let course = courses
        .find_one(doc! { "_id": course_id })
        .await?
        .ok_or_else(|| AppError::not_found("Course"))?;

    let user = load_user(&state, &claims.sub).await?;
    let enrolled = user.enrolled_courses.contains(&payload.course_id)
        || course
            .track_id
            .as_ref()
            .is_some_and(|track| user.enrolled_tracks.contains(track));

    if !enrolled && !claims.is_admin() {
        return Err(AppError::Unauthorized);
    }

    let mut review = Review {
        id: None,
        user_id: claims.sub.clone(),
        user_name: user.full_name,
        course_id: payload.course_id,
        rating: payload.rating,
        comment: payload.comment.trim().to_string(),
        created_at: Utc::now(),
    };

    // Unique (userId, courseId) index turns a second review into a 409.
    let result = reviews(&state).insert_one(&review).await?;
    review.id = result.inserted_id.as_object_id();

    tracing::info!("⭐ {} rated course {} {}/5", claims.sub, review.course_id, review.rating);
    Ok((StatusCode::CREATED, Json(review)))
}
