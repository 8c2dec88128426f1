use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::ReturnDocument;
use mongodb::Collection;
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::models::course::{Course, CourseQuery, CreateCourse, UpdateCourse};
use crate::models::track::Track;
use crate::models::{parse_object_id, timestamp};
use crate::state::AppState;

fn courses(state: &AppState) -> Collection<Course> {
    state.db.collection("courses")
}

fn tracks(state: &AppState) -> Collection<Track> {
    state.db.collection("tracks")
}

async fn ensure_track_exists(state: &AppState, track_id: &str) -> Result<()> {
    let object_id = parse_object_id(track_id, "Track")?;
    if tracks(state).find_one(doc! { "_id": object_id }).await?.is_none() {
        return Err(AppError::not_found("Track"));
    }
    Ok(())
}

/// Keeps `Track.courseIds` in step with `Course.trackId`.
async fn link_course(state: &AppState, track_id: &str, course_id: &str) -> Result<()> {
    let object_id = parse_object_id(track_id, "Track")?;
    tracks(state)
        .update_one(
            doc! { "_id": object_id },
            doc! { "$addToSet": { "courseIds": course_id }, "$set": { "updatedAt": timestamp() } },
        )
        .await?;
    Ok(())
}

async fn unlink_course(state: &AppState, course_id: &str) -> Result<()> {
    tracks(state)
        .update_many(
            doc! { "courseIds": course_id },
            doc! { "$pull": { "courseIds": course_id }, "$set": { "updatedAt": timestamp() } },
        )
        .await?;
    Ok(())
}

pub async fn list_courses(
    State(state): State<AppState>,
    Query(query): Query<CourseQuery>,
) -> Result<Json<Vec<Course>>> {
    let mut filter = doc! {};
    if let Some(track_id) = &query.track_id {
        filter.insert("trackId", track_id);
    }
    if let Some(status) = query.status {
        filter.insert("status", status.as_str());
    }

    let cursor = courses(&state).find(filter).sort(doc! { "createdAt": -1 }).await?;
    let courses: Vec<Course> = cursor.try_collect().await?;

    tracing::debug!("Fetched {} courses", courses.len());
    Ok(Json(courses))
}

pub async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Course>> {
    let object_id = parse_object_id(&id, "Course")?;

    courses(&state)
        .find_one(doc! { "_id": object_id })
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Course"))
}

pub async fn create_course(
    State(state): State<AppState>,
    Json(payload): Json<CreateCourse>,
) -> Result<(StatusCode, Json<Course>)> {
    payload.validate()?;

    if let Some(track_id) = &payload.track_id {
        ensure_track_exists(&state, track_id).await?;
    }

    let now = Utc::now();
    let mut course = Course {
        id: None,
        title: payload.title.trim().to_string(),
        description: payload.description,
        track_id: payload.track_id,
        price: payload.price,
        instructor: payload.instructor,
        duration_weeks: payload.duration_weeks,
        image_url: None,
        status: payload.status.unwrap_or_default(),
        created_at: now,
        updated_at: now,
    };

    let inserted = courses(&state).insert_one(&course).await?;
    let id = inserted
        .inserted_id
        .as_object_id()
        .ok_or_else(|| AppError::service("Inserted course has no ObjectId"))?;
    course.id = Some(id);

    if let Some(track_id) = &course.track_id {
        link_course(&state, track_id, &id.to_hex()).await?;
    }

    tracing::info!("📘 Created course '{}'", course.title);
    Ok((StatusCode::CREATED, Json(course)))
}

fn course_update_doc(payload: &UpdateCourse) -> Result<Document> {
    let mut set = doc! {};

    if let Some(title) = &payload.title {
        set.insert("title", title.trim());
    }
    if let Some(description) = &payload.description {
        set.insert("description", description);
    }
    if let Some(track_id) = &payload.track_id {
        set.insert("trackId", track_id);
    }
    if let Some(price) = payload.price {
        set.insert("price", price);
    }
    if let Some(instructor) = &payload.instructor {
        set.insert("instructor", instructor);
    }
    if let Some(weeks) = payload.duration_weeks {
        set.insert("durationWeeks", weeks);
    }
    if let Some(status) = payload.status {
        set.insert("status", status.as_str());
    }

    if set.is_empty() {
        return Err(AppError::invalid_data("Nothing to update"));
    }
    set.insert("updatedAt", timestamp());
    Ok(doc! { "$set": set })
}

pub async fn update_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateCourse>,
) -> Result<Json<Course>> {
    payload.validate()?;
    let object_id = parse_object_id(&id, "Course")?;

    if let Some(track_id) = &payload.track_id {
        ensure_track_exists(&state, track_id).await?;
    }

    let course = courses(&state)
        .find_one_and_update(doc! { "_id": object_id }, course_update_doc(&payload)?)
        .return_document(ReturnDocument::After)
        .await?
        .ok_or_else(|| AppError::not_found("Course"))?;

    if let Some(track_id) = &payload.track_id {
        unlink_course(&state, &id).await?;
        link_course(&state, track_id, &id).await?;
    }

    Ok(Json(course))
}

pub async fn delete_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let object_id = parse_object_id(&id, "Course")?;

    let result = courses(&state).delete_one(doc! { "_id": object_id }).await?;
    if result.deleted_count == 0 {
        return Err(AppError::not_found("Course"));
    }

    unlink_course(&state, &id).await?;

    tracing::info!("🗑️ Deleted course {}", id);
    Ok(StatusCode::NO_CONTENT)
}
