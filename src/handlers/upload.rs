use axum::{
    extract::{Multipart, Path, State},
    response::Json,
};
use bytes::Bytes;
use mongodb::bson::{doc, Document};
use mongodb::Collection;
use serde::Serialize;

use crate::errors::{AppError, Result};
use crate::models::{parse_object_id, timestamp};
use crate::state::AppState;

const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
/// Room for the image plus multipart framing; axum defaults to 2MB.
pub const UPLOAD_BODY_LIMIT: usize = MAX_IMAGE_BYTES + 64 * 1024;
const THUMB_WIDTH: u32 = 640;
const THUMB_HEIGHT: u32 = 360;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUploadResponse {
    pub success: bool,
    pub image_url: String,
    pub thumbnail_url: String,
}

struct ImageUpload {
    data: Bytes,
    mime_type: mime::Mime,
    file_stem: Option<String>,
}

/// Checks the magic bytes, not the client's content type.
fn detect_image(data: &[u8]) -> Result<mime::Mime> {
    let kind = infer::get(data).ok_or(AppError::InvalidImageFormat)?;
    let mime_type: mime::Mime = kind
        .mime_type()
        .parse()
        .map_err(|_| AppError::InvalidImageFormat)?;

    if mime_type.type_() != mime::IMAGE {
        return Err(AppError::InvalidImageFormat);
    }
    Ok(mime_type)
}

fn public_id_from_filename(file_name: &str) -> Option<String> {
    let clean = sanitize_filename::sanitize(file_name);
    let stem = clean.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(&clean);
    let stem = stem.trim().replace(' ', "-").to_lowercase();
    if stem.is_empty() {
        None
    } else {
        Some(stem)
    }
}

async fn read_image(mut multipart: Multipart) -> Result<ImageUpload> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }

        let file_stem = field.file_name().and_then(public_id_from_filename);
        let data = field.bytes().await?;

        if data.is_empty() {
            return Err(AppError::NoImageProvided);
        }
        if data.len() > MAX_IMAGE_BYTES {
            return Err(AppError::ImageTooLarge);
        }

        let mime_type = detect_image(&data)?;
        return Ok(ImageUpload { data, mime_type, file_stem });
    }

    Err(AppError::NoImageProvided)
}

async fn upload_and_attach(
    state: &AppState,
    collection: &str,
    id: &str,
    multipart: Multipart,
) -> Result<Json<ImageUploadResponse>> {
    let object_id = parse_object_id(id, collection)?;
    let images = state.images()?;
    let upload = read_image(multipart).await?;

    let public_id = match &upload.file_stem {
        Some(stem) => format!("{}-{}", id, stem),
        None => id.to_string(),
    };

    let uploaded = images
        .upload_image(
            upload.data.to_vec(),
            upload.mime_type.essence_str(),
            collection,
            Some(&public_id),
        )
        .await?;

    let target: Collection<Document> = state.db.collection(collection);
    let result = target
        .update_one(
            doc! { "_id": object_id },
            doc! { "$set": { "imageUrl": &uploaded.secure_url, "updatedAt": timestamp() } },
        )
        .await?;

    if result.matched_count == 0 {
        return Err(AppError::not_found(collection));
    }

    tracing::info!("🖼️ Uploaded image for {} {}", collection, id);
    Ok(Json(ImageUploadResponse {
        success: true,
        thumbnail_url: images.thumbnail_url(&uploaded.public_id, THUMB_WIDTH, THUMB_HEIGHT),
        image_url: uploaded.secure_url,
    }))
}

pub async fn upload_track_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<ImageUploadResponse>> {
    upload_and_attach(&state, "tracks", &id, multipart).await
}

pub async fn upload_course_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<ImageUploadResponse>> {
    upload_and_attach(&state, "courses", &id, multipart).await
}
