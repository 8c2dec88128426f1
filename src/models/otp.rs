use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const OTP_TTL_MINUTES: i64 = 10;
pub const OTP_MAX_ATTEMPTS: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    VerifyEmail,
    ResetPassword,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EmailOtp {
    pub code: String,          // 6-digit OTP
    pub purpose: OtpPurpose,
    pub attempts: i32,         // Failed attempts
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl EmailOtp {
    pub fn new(code: String, purpose: OtpPurpose, now: DateTime<Utc>) -> Self {
        EmailOtp {
            code,
            purpose,
            attempts: 0,
            expires_at: now + Duration::minutes(OTP_TTL_MINUTES),
            created_at: now,
        }
    }

    pub fn matches(&self, code: &str, purpose: OtpPurpose, now: DateTime<Utc>) -> bool {
        self.purpose == purpose
            && self.attempts < OTP_MAX_ATTEMPTS
            && self.expires_at > now
            && self.code == code
    }
}
