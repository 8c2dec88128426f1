use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use futures_util::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::ReturnDocument;
use mongodb::Collection;
use serde::Serialize;
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::models::cart::Cart;
use crate::models::invoice::Invoice;
use crate::models::user::{LearnerQuery, UpdateLearner, User, UserResponse};
use crate::models::{parse_object_id, timestamp};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct LearnerDetail {
    pub learner: UserResponse,
    pub invoices: Vec<Invoice>,
}

fn users(state: &AppState) -> Collection<User> {
    state.db.collection("users")
}

fn learner_filter(id: &str) -> Result<Document> {
    let object_id = parse_object_id(id, "Learner")?;
    Ok(doc! { "_id": object_id, "role": "learner" })
}

pub async fn list_learners(
    State(state): State<AppState>,
    Query(query): Query<LearnerQuery>,
) -> Result<Json<Vec<UserResponse>>> {
    let mut filter = doc! { "role": "learner" };
    if let Some(email) = &query.email {
        filter.insert("email", email.trim().to_lowercase());
    }
    if let Some(verified) = query.verified {
        filter.insert("emailVerified", verified);
    }

    let cursor = users(&state).find(filter).sort(doc! { "createdAt": -1 }).await?;
    let learners: Vec<User> = cursor.try_collect().await?;

    Ok(Json(learners.into_iter().map(UserResponse::from).collect()))
}

pub async fn get_learner(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LearnerDetail>> {
    let learner = users(&state)
        .find_one(learner_filter(&id)?)
        .await?
        .ok_or_else(|| AppError::not_found("Learner"))?;

    let invoices: Collection<Invoice> = state.db.collection("invoices");
    let cursor = invoices.find(doc! { "userId": &id }).sort(doc! { "createdAt": -1 }).await?;

    Ok(Json(LearnerDetail {
        learner: learner.into(),
        invoices: cursor.try_collect().await?,
    }))
}

fn learner_update_doc(payload: &UpdateLearner) -> Result<Document> {
    let mut set = doc! {};

    if let Some(name) = &payload.full_name {
        set.insert("fullName", name.trim());
    }
    if let Some(phone) = &payload.phone {
        set.insert("phone", phone);
    }
    if let Some(verified) = payload.email_verified {
        set.insert("emailVerified", verified);
    }
    if let Some(tracks) = &payload.enrolled_tracks {
        set.insert("enrolledTracks", tracks.clone());
    }
    if let Some(courses) = &payload.enrolled_courses {
        set.insert("enrolledCourses", courses.clone());
    }

    if set.is_empty() {
        return Err(AppError::invalid_data("Nothing to update"));
    }
    set.insert("updatedAt", timestamp());
    Ok(doc! { "$set": set })
}

pub async fn update_learner(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateLearner>,
) -> Result<Json<UserResponse>> {
    payload.validate()?;

    users(&state)
        .find_one_and_update(learner_filter(&id)?, learner_update_doc(&payload)?)
        .return_document(ReturnDocument::After)
        .await?
        .map(|user| Json(user.into()))
        .ok_or_else(|| AppError::not_found("Learner"))
}

/// Invoices are kept as financial records; the cart goes with the learner.
pub async fn delete_learner(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let result = users(&state).delete_one(learner_filter(&id)?).await?;
    if result.deleted_count == 0 {
        return Err(AppError::not_found("Learner"));
    }

    let carts: Collection<Cart> = state.db.collection("carts");
    carts.delete_one(doc! { "_id": &id }).await?;

    tracing::info!("🗑️ Deleted learner {}", id);
    Ok(StatusCode::NO_CONTENT)
}
