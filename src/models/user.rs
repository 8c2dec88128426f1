use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::otp::EmailOtp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Learner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(default)]
    pub email_verified: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp: Option<EmailOtp>,

    // Invoice references, pushed with $addToSet on verified payments.
    #[serde(default)]
    pub invoices: Vec<String>,
    #[serde(default)]
    pub pending_payments: Vec<String>,
    #[serde(default)]
    pub enrolled_tracks: Vec<String>,
    #[serde(default)]
    pub enrolled_courses: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    #[validate(length(min = 2, message = "Full name must be at least 2 characters"))]
    pub full_name: String,

    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,

    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginUser {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLearner {
    #[validate(length(min = 2))]
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub email_verified: Option<bool>,
    pub enrolled_tracks: Option<Vec<String>>,
    pub enrolled_courses: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct LearnerQuery {
    pub email: Option<String>,
    pub verified: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub phone: Option<String>,
    pub email_verified: bool,
    pub invoices: Vec<String>,
    pub pending_payments: Vec<String>,
    pub enrolled_tracks: Vec<String>,
    pub enrolled_courses: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            full_name: user.full_name,
            email: user.email,
            role: user.role,
            phone: user.phone,
            email_verified: user.email_verified,
            invoices: user.invoices,
            pending_payments: user.pending_payments,
            enrolled_tracks: user.enrolled_tracks,
            enrolled_courses: user.enrolled_courses,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub exp: usize,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Some(ObjectId::new()),
            full_name: "Ada Obi".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "hash".to_string(),
            role: Role::Learner,
            phone: None,
            email_verified: false,
            otp: None,
            invoices: vec!["CS-1".to_string()],
            pending_payments: vec![],
            enrolled_tracks: vec![],
            enrolled_courses: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_user_response_hides_secrets() {
        let user = sample_user();
        let id = user.id.unwrap().to_hex();
        let json = serde_json::to_value(UserResponse::from(user)).unwrap();

        assert_eq!(json["id"], id);
        assert_eq!(json["fullName"], "Ada Obi");
        assert_eq!(json["role"], "learner");
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("otp").is_none());
    }

    #[test]
    fn test_legacy_document_defaults_arrays() {
        let raw = serde_json::json!({
            "fullName": "Old Learner",
            "email": "old@example.com",
            "passwordHash": "x",
            "role": "learner",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        });
        let user: User = serde_json::from_value(raw).unwrap();
        assert!(user.invoices.is_empty());
        assert!(user.enrolled_tracks.is_empty());
        assert!(!user.email_verified);
    }

    #[test]
    fn test_create_user_validation() {
        let payload = CreateUser {
            full_name: "A".to_string(),
            email: "not-an-email".to_string(),
            password: "123".to_string(),
            phone: None,
        };
        let errors = payload.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }
}
