use reqwest::Client;
use serde::Serialize;

use crate::config::MailConfig;
use crate::errors::{AppError, Result};
use crate::models::otp::{OtpPurpose, OTP_TTL_MINUTES};

#[derive(Debug, Serialize)]
struct OutgoingMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: String,
}

#[derive(Clone)]
pub struct MailService {
    config: MailConfig,
    client: Client,
}

impl MailService {
    pub fn new(config: MailConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub async fn send_otp(&self, email: &str, name: &str, otp: &str, purpose: OtpPurpose) -> Result<()> {
        let (subject, text) = otp_message(name, otp, purpose);

        let mail = OutgoingMail {
            from: &self.config.from,
            to: email,
            subject,
            text,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&mail)
            .send()
            .await
            .map_err(|e| AppError::external_api(format!("Mail API error: {}", e)))?;

        if response.status().is_success() {
            tracing::info!("OTP mail sent to {}", email);
            Ok(())
        } else {
            Err(AppError::ExternalApi(format!(
                "Mail sending failed with status: {}",
                response.status()
            )))
        }
    }
}

fn otp_message(name: &str, otp: &str, purpose: OtpPurpose) -> (&'static str, String) {
    let (subject, action) = match purpose {
        OtpPurpose::VerifyEmail => ("Verify your CourseStack email", "verify your email address"),
        OtpPurpose::ResetPassword => ("Reset your CourseStack password", "reset your password"),
    };
    let text = format!(
        "Hi {},\n\nUse {} to {}. The code expires in {} minutes.\n\nIf you did not request this, ignore this email.",
        name, otp, action, OTP_TTL_MINUTES
    );
    (subject, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_message() {
        let (subject, text) = otp_message("Ada", "123456", OtpPurpose::ResetPassword);
        assert_eq!(subject, "Reset your CourseStack password");
        assert!(text.contains("123456"));
        assert!(text.contains("reset your password"));
        assert!(text.contains("10 minutes"));
    }
}
