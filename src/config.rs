// config.rs
use std::env;

use crate::errors::{AppError, Result};

#[derive(Debug, Clone)]
pub struct PaystackConfig {
    pub secret_key: String,
    pub base_url: String,
    pub callback_url: Option<String>,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub upload_preset: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub admin_emails: Vec<String>,
    pub app_env: String,
    pub port: u16,
    pub host: String,
    pub paystack: Option<PaystackConfig>,
    pub mail: Option<MailConfig>,
    pub cloudinary: Option<CloudinaryConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) => secret,
            Err(_) if app_env != "production" => {
                tracing::warn!("JWT_SECRET not set, using development secret");
                "coursestack-dev-secret".to_string()
            }
            Err(_) => return Err(AppError::configuration("JWT_SECRET must be set")),
        };

        let port = env::var("PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| AppError::configuration("PORT must be a number"))?;

        Ok(AppConfig {
            database_url: required("DATABASE_URL")?,
            database_name: env::var("DATABASE_NAME").unwrap_or_else(|_| "coursestack".to_string()),
            jwt_secret,
            admin_emails: parse_admin_emails(&env::var("ADMIN_EMAILS").unwrap_or_default()),
            app_env,
            port,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            paystack: paystack_from_env(),
            mail: mail_from_env(),
            cloudinary: cloudinary_from_env(),
        })
    }

    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|a| a.eq_ignore_ascii_case(email.trim()))
    }
}

fn parse_admin_emails(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

fn required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| AppError::configuration(format!("{} must be set", key)))
}

fn paystack_from_env() -> Option<PaystackConfig> {
    let secret_key = env::var("PAYSTACK_SECRET_KEY").ok()?;

    Some(PaystackConfig {
        secret_key,
        base_url: env::var("PAYSTACK_BASE_URL")
            .unwrap_or_else(|_| "https://api.paystack.co".to_string()),
        callback_url: env::var("PAYSTACK_CALLBACK_URL").ok(),
        currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "NGN".to_string()),
    })
}

fn mail_from_env() -> Option<MailConfig> {
    Some(MailConfig {
        api_url: env::var("MAIL_API_URL").ok()?,
        api_key: env::var("MAIL_API_KEY").ok()?,
        from: env::var("MAIL_FROM").unwrap_or_else(|_| "no-reply@coursestack.dev".to_string()),
    })
}

fn cloudinary_from_env() -> Option<CloudinaryConfig> {
    Some(CloudinaryConfig {
        cloud_name: env::var("CLOUDINARY_CLOUD_NAME").ok()?,
        upload_preset: env::var("CLOUDINARY_UPLOAD_PRESET")
            .unwrap_or_else(|_| "ml_default".to_string()),
    })
}
