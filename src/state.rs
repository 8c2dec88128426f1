use mongodb::Database;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::services::cloudinary::CloudinaryService;
use crate::services::mail_service::MailService;
use crate::services::otp_service::OTPService;
use crate::services::payment_service::PaymentService;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<AppConfig>,
    pub otp_service: OTPService,
    pub payment_service: Option<Arc<PaymentService>>,
    pub mail_service: Option<MailService>,
    pub cloudinary: Option<CloudinaryService>,
}

impl AppState {
    pub fn new(db: Database, config: AppConfig) -> Self {
        let otp_service = OTPService::new(db.clone(), config.jwt_secret.clone());

        AppState {
            db,
            config: Arc::new(config),
            otp_service,
            payment_service: None,
            mail_service: None,
            cloudinary: None,
        }
    }

    pub fn with_payments(mut self, payment_service: Arc<PaymentService>) -> Self {
        self.payment_service = Some(payment_service);
        self
    }

    pub fn with_mail(mut self, mail_service: MailService) -> Self {
        self.mail_service = Some(mail_service);
        self
    }

    pub fn with_cloudinary(mut self, cloudinary: CloudinaryService) -> Self {
        self.cloudinary = Some(cloudinary);
        self
    }

    pub fn payments(&self) -> Result<&PaymentService> {
        self.payment_service
            .as_deref()
            .ok_or_else(|| AppError::unavailable("Payment gateway is not configured"))
    }

    pub fn images(&self) -> Result<&CloudinaryService> {
        self.cloudinary
            .as_ref()
            .ok_or_else(|| AppError::unavailable("Image uploads are not configured"))
    }
}
