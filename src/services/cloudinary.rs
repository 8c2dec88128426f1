use reqwest::{multipart, Client};
use serde_json::Value;

use crate::config::CloudinaryConfig;
use crate::errors::{AppError, Result};

#[derive(Clone)]
pub struct CloudinaryService {
    config: CloudinaryConfig,
    client: Client,
}

#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub secure_url: String,
    pub public_id: String,
}

impl CloudinaryService {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    /// Upload image using the unsigned upload preset
    pub async fn upload_image(
        &self,
        image_data: Vec<u8>,
        mime_type: &str,
        folder: &str,
        public_id: Option<&str>,
    ) -> Result<UploadedImage> {
        let upload_url = format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.config.cloud_name
        );

        let file_part = multipart::Part::bytes(image_data)
            .file_name("upload")
            .mime_str(mime_type)
            .map_err(|e| AppError::cloudinary(e.to_string()))?;

        let mut form = multipart::Form::new()
            .text("upload_preset", self.config.upload_preset.clone())
            .text("folder", folder.to_string())
            .part("file", file_part);

        if let Some(pid) = public_id {
            form = form.text("public_id", pid.to_string());
        }

        let response = self
            .client
            .post(&upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::cloudinary(format!("Upload failed: {}", e)))?;

        let result: Value = response
            .json()
            .await
            .map_err(|e| AppError::cloudinary(format!("Failed to parse response: {}", e)))?;

        parse_upload_response(&result)
    }

    /// Generate thumbnail URL
    pub fn thumbnail_url(&self, public_id: &str, width: u32, height: u32) -> String {
        format!(
            "https://res.cloudinary.com/{}/image/upload/c_fill,w_{},h_{},q_auto/{}",
            self.config.cloud_name, width, height, public_id
        )
    }
}

fn parse_upload_response(result: &Value) -> Result<UploadedImage> {
    if let Some(error) = result.get("error") {
        let error_msg = error["message"].as_str().unwrap_or("Unknown Cloudinary error");
        return Err(AppError::cloudinary(error_msg));
    }

    let secure_url = result["secure_url"]
        .as_str()
        .ok_or_else(|| AppError::cloudinary("No secure URL in response"))?
        .to_string();

    let public_id = result["public_id"]
        .as_str()
        .ok_or_else(|| AppError::cloudinary("No public ID in response"))?
        .to_string();

    Ok(UploadedImage { secure_url, public_id })
}
