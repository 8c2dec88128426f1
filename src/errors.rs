// src/errors.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mongodb::error::{ErrorKind, WriteFailure};
use serde_json::json;
use thiserror::Error;

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("MongoDB error: {0}")]
    MongoDB(mongodb::error::Error),

    #[error("Multipart error: {0}")]
    Multipart(String),

    #[error("Invalid image format")]
    InvalidImageFormat,

    #[error("Image too large")]
    ImageTooLarge,

    #[error("No image provided")]
    NoImageProvided,

    #[error("Invalid ObjectId: {0}")]
    InvalidObjectId(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Duplicate entry: {0}")]
    DuplicateKey(String),

    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),

    #[error("Payment not successful: gateway status is {0}")]
    PaymentNotSuccessful(String),

    #[error("Amount mismatch: expected {expected}, gateway reported {reported}")]
    AmountMismatch { expected: i64, reported: i64 },

    #[error("Currency mismatch: expected {expected}, gateway reported {reported}")]
    CurrencyMismatch { expected: String, reported: String },

    #[error("Payment {0} is already being verified")]
    PaymentInProgress(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Authentication error")]
    AuthError,

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid or expired OTP")]
    InvalidOtp,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Cloudinary error: {0}")]
    CloudinaryError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Service error: {0}")]
    ServiceError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MongoDB(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Multipart(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidImageFormat => StatusCode::BAD_REQUEST,
            AppError::ImageTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NoImageProvided => StatusCode::BAD_REQUEST,
            AppError::InvalidObjectId(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateKey(_) => StatusCode::CONFLICT,
            AppError::PaymentGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::PaymentNotSuccessful(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::AmountMismatch { .. } => StatusCode::BAD_REQUEST,
            AppError::CurrencyMismatch { .. } => StatusCode::BAD_REQUEST,
            AppError::PaymentInProgress(_) => StatusCode::CONFLICT,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::AuthError => StatusCode::UNAUTHORIZED,
            AppError::Unauthorized => StatusCode::FORBIDDEN,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidOtp => StatusCode::BAD_REQUEST,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ExternalApi(_) => StatusCode::BAD_GATEWAY,
            AppError::CloudinaryError(_) => StatusCode::BAD_GATEWAY,
            AppError::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ServiceError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            AppError::MongoDB(_) => "Database error",
            AppError::Multipart(_) => "Invalid multipart data",
            AppError::InvalidImageFormat => "Invalid image format",
            AppError::ImageTooLarge => "Image too large",
            AppError::NoImageProvided => "No image provided",
            AppError::InvalidObjectId(_) => "Invalid ID format",
            AppError::NotFound(_) => "Not found",
            AppError::DuplicateKey(_) => "Duplicate entry",
            AppError::PaymentGateway(_) => "Payment gateway error",
            AppError::PaymentNotSuccessful(_) => "Payment not successful",
            AppError::AmountMismatch { .. } => "Payment amount mismatch",
            AppError::CurrencyMismatch { .. } => "Payment currency mismatch",
            AppError::PaymentInProgress(_) => "Payment verification in progress",
            AppError::InvalidCredentials => "Invalid credentials",
            AppError::AuthError => "Authentication failed",
            AppError::Unauthorized => "Unauthorized access",
            AppError::ValidationError(_) => "Validation failed",
            AppError::InvalidOtp => "Invalid or expired OTP",
            AppError::ServiceUnavailable(_) => "Service unavailable",
            AppError::ExternalApi(_) => "External API error",
            AppError::CloudinaryError(_) => "Cloudinary error",
            AppError::ConfigurationError(_) => "Configuration error",
            AppError::ServiceError(_) => "Service error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::warn!("{}", self);
        }

        // Internal details stay in the logs.
        let message = match &self {
            AppError::MongoDB(_) | AppError::ConfigurationError(_) | AppError::ServiceError(_) => {
                self.public_message().to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": self.public_message(),
            "message": message,
            "success": false,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        if let ErrorKind::Write(WriteFailure::WriteError(ref write_error)) = *err.kind {
            if write_error.code == DUPLICATE_KEY_CODE {
                return AppError::DuplicateKey(write_error.message.clone());
            }
        }
        AppError::MongoDB(err)
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::Multipart(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ValidationError(format!("JSON parsing error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalApi(format!("HTTP request failed: {}", err))
    }
}

impl From<mongodb::bson::oid::Error> for AppError {
    fn from(err: mongodb::bson::oid::Error) -> Self {
        AppError::InvalidObjectId(err.to_string())
    }
}

impl From<mongodb::bson::ser::Error> for AppError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        AppError::ServiceError(format!("BSON conversion failed: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::ServiceError(format!("Password hashing failed: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::ServiceError(format!("Token generation failed: {}", err))
    }
}

// Helper conversion functions
impl AppError {
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn gateway(msg: impl Into<String>) -> Self {
        AppError::PaymentGateway(msg.into())
    }

    pub fn external_api(msg: impl Into<String>) -> Self {
        AppError::ExternalApi(msg.into())
    }

    pub fn cloudinary(msg: impl Into<String>) -> Self {
        AppError::CloudinaryError(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        AppError::ConfigurationError(msg.into())
    }

    pub fn service(msg: impl Into<String>) -> Self {
        AppError::ServiceError(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        AppError::ServiceUnavailable(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
