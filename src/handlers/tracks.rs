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
use crate::models::course::Course;
use crate::models::track::{CreateTrack, Track, TrackQuery, UpdateTrack};
use crate::models::{parse_object_id, timestamp};
use crate::state::AppState;

fn tracks(state: &AppState) -> Collection<Track> {
    state.db.collection("tracks")
}

pub async fn list_tracks(
    State(state): State<AppState>,
    Query(query): Query<TrackQuery>,
) -> Result<Json<Vec<Track>>> {
    let mut filter = doc! {};
    if let Some(status) = query.status {
        filter.insert("status", status.as_str());
    }

    let cursor = tracks(&state).find(filter).sort(doc! { "createdAt": -1 }).await?;
    let tracks: Vec<Track> = cursor.try_collect().await?;

    tracing::debug!("Fetched {} tracks", tracks.len());
    Ok(Json(tracks))
}

pub async fn get_track(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Track>> {
    let object_id = parse_object_id(&id, "Track")?;

    tracks(&state)
        .find_one(doc! { "_id": object_id })
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Track"))
}

pub async fn create_track(
    State(state): State<AppState>,
    Json(payload): Json<CreateTrack>,
) -> Result<(StatusCode, Json<Track>)> {
    payload.validate()?;

    let now = Utc::now();
    let mut track = Track {
        id: None,
        title: payload.title.trim().to_string(),
        description: payload.description,
        price: payload.price,
        image_url: None,
        course_ids: payload.course_ids,
        status: payload.status.unwrap_or_default(),
        created_at: now,
        updated_at: now,
    };

    let inserted = tracks(&state).insert_one(&track).await?;
    track.id = inserted.inserted_id.as_object_id();

    tracing::info!("📚 Created track '{}'", track.title);
    Ok((StatusCode::CREATED, Json(track)))
}

fn track_update_doc(payload: &UpdateTrack) -> Result<Document> {
    let mut set = doc! {};

    if let Some(title) = &payload.title {
        set.insert("title", title.trim());
    }
    if let Some(description) = &payload.description {
        set.insert("description", description);
    }
    if let Some(price) = payload.price {
        set.insert("price", price);
    }
    if let Some(course_ids) = &payload.course_ids {
        set.insert("courseIds", course_ids.clone());
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

pub async fn update_track(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateTrack>,
) -> Result<Json<Track>> {
    payload.validate()?;
    let object_id = parse_object_id(&id, "Track")?;

    tracks(&state)
        .find_one_and_update(doc! { "_id": object_id }, track_update_doc(&payload)?)
        .return_document(ReturnDocument::After)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Track"))
}

pub async fn delete_track(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let object_id = parse_object_id(&id, "Track")?;

    let result = tracks(&state).delete_one(doc! { "_id": object_id }).await?;
    if result.deleted_count == 0 {
        return Err(AppError::not_found("Track"));
    }

    // Courses outlive their track.
    let courses: Collection<Course> = state.db.collection("courses");
    courses
        .update_many(
            doc! { "trackId": &id },
            doc! { "$unset": { "trackId": "" }, "$set": { "updatedAt": timestamp() } },
        )
        .await?;

    tracing::info!("🗑️ Deleted track {}", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_track_courses(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Course>>> {
    parse_object_id(&id, "Track")?;

    let courses: Collection<Course> = state.db.collection("courses");
    let cursor = courses.find(doc! { "trackId": &id }).sort(doc! { "createdAt": 1 }).await?;
    Ok(Json(cursor.try_collect().await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::track::PublishStatus;

    fn empty_update() -> UpdateTrack {
        UpdateTrack {
            title: None,
            description: None,
            price: None,
            course_ids: None,
            status: None,
        }
    }

    #[test]
    fn test_update_doc_sets_only_given_fields() {
        let payload = UpdateTrack {
            title: Some("  Data Engineering ".into()),
            price: Some(120000.0),
            status: Some(PublishStatus::Published),
            ..empty_update()
        };
        let update = track_update_doc(&payload).unwrap();
        let set = update.get_document("$set").unwrap();

        assert_eq!(set.get_str("title").unwrap(), "Data Engineering");
        assert_eq!(set.get_f64("price").unwrap(), 120000.0);
        assert_eq!(set.get_str("status").unwrap(), "published");
        assert!(set.contains_key("updatedAt"));
        assert!(!set.contains_key("description"));
    }

    #[test]
    fn test_empty_update_rejected() {
        assert!(matches!(
            track_update_doc(&empty_update()),
            Err(AppError::ValidationError(_))
        ));
    }
}
