use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mongodb::{
    bson::{self, doc, oid::ObjectId},
    Collection, Database,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, Result};
use crate::models::otp::{EmailOtp, OtpPurpose};
use crate::models::timestamp;
use crate::models::user::User;

const RESET_PURPOSE: &str = "password_reset";
const RESET_TOKEN_TTL_MINUTES: i64 = 15;

#[derive(Debug, Serialize, Deserialize)]
struct ResetClaims {
    user_id: String,
    purpose: String,
    /// Salt of the password hash the token was issued against.
    pwd: String,
    exp: usize,
}

/// A decoded reset token. It stops matching once the password changes.
#[derive(Debug)]
pub struct ResetGrant {
    pub user_id: String,
    fingerprint: String,
}

impl ResetGrant {
    pub fn matches(&self, current_hash: &str) -> bool {
        !self.fingerprint.is_empty() && self.fingerprint == password_fingerprint(current_hash)
    }
}

/// The bcrypt salt (`$2b$12$<22 chars>...`). Every new hash gets a new salt.
fn password_fingerprint(password_hash: &str) -> String {
    password_hash.get(7..29).unwrap_or_default().to_string()
}

#[derive(Clone)]
pub struct OTPService {
    db: Database,
    jwt_secret: String,
}

impl OTPService {
    pub fn new(db: Database, jwt_secret: String) -> Self {
        Self { db, jwt_secret }
    }

    fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    // Generate 6-digit OTP
    pub fn generate_otp() -> String {
        let mut rng = rand::thread_rng();
        format!("{:06}", rng.gen_range(0..1_000_000))
    }

    /// Stores a fresh OTP on the user, replacing any previous one, and returns the code.
    pub async fn issue_otp(&self, user_id: &ObjectId, purpose: OtpPurpose) -> Result<String> {
        let code = Self::generate_otp();
        let otp = EmailOtp::new(code.clone(), purpose, Utc::now());

        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": {
                    "otp": bson::to_bson(&otp)?,
                    "updatedAt": timestamp(),
                } },
            )
            .await?;

        Ok(code)
    }

    /// Consumes the OTP on success, counts a failed attempt otherwise.
    pub async fn verify_user_otp(
        &self,
        user_id: &ObjectId,
        code: &str,
        purpose: OtpPurpose,
    ) -> Result<bool> {
        let user = match self.users().find_one(doc! { "_id": user_id }).await? {
            Some(user) => user,
            None => return Ok(false),
        };

        let Some(otp) = user.otp else {
            return Ok(false);
        };

        if otp.matches(code, purpose, Utc::now()) {
            self.users()
                .update_one(
                    doc! { "_id": user_id },
                    doc! {
                        "$unset": { "otp": "" },
                        "$set": { "updatedAt": timestamp() },
                    },
                )
                .await?;
            Ok(true)
        } else {
            self.users()
                .update_one(
                    doc! { "_id": user_id },
                    doc! {
                        "$inc": { "otp.attempts": 1 },
                        "$set": { "updatedAt": timestamp() },
                    },
                )
                .await?;
            Ok(false)
        }
    }

    pub fn generate_reset_token(&self, user_id: &str, password_hash: &str) -> Result<String> {
        let expiration = Utc::now()
            .checked_add_signed(Duration::minutes(RESET_TOKEN_TTL_MINUTES))
            .ok_or_else(|| AppError::service("Failed to calculate expiration"))?
            .timestamp() as usize;

        let claims = ResetClaims {
            user_id: user_id.to_string(),
            purpose: RESET_PURPOSE.to_string(),
            pwd: password_fingerprint(password_hash),
            exp: expiration,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?)
    }

    pub fn decode_reset_token(&self, token: &str) -> Result<ResetGrant> {
        decode_reset_token(token, &self.jwt_secret)
    }
}

fn decode_reset_token(token: &str, secret: &str) -> Result<ResetGrant> {
    let data = decode::<ResetClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|_| AppError::AuthError)?;

    if data.claims.purpose != RESET_PURPOSE {
        return Err(AppError::AuthError);
    }
    Ok(ResetGrant {
        user_id: data.claims.user_id,
        fingerprint: data.claims.pwd,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const OLD_HASH: &str = "$2b$12$R9h/cIPz0gi.URNNX3kh2OPST9/PgBkqquzi.Ss7KIUgO2t0jWMUW";
    const NEW_HASH: &str = "$2b$12$EXRkfkdmXn2gzds2SSitu.MW9.gAVqa9eLS1//RYtYCmB1eLHg.9q";

    fn reset_token(secret: &str, purpose: &str, minutes: i64) -> String {
        let claims = ResetClaims {
            user_id: "65a1f0c2e4b0a1b2c3d4e5f6".into(),
            purpose: purpose.into(),
            pwd: password_fingerprint(OLD_HASH),
            exp: (Utc::now() + Duration::minutes(minutes)).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_generate_otp_is_six_digits() {
        for _ in 0..50 {
            let otp = OTPService::generate_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_reset_token_round_trip() {
        let token = reset_token("secret", RESET_PURPOSE, 10);
        let grant = decode_reset_token(&token, "secret").unwrap();
        assert_eq!(grant.user_id, "65a1f0c2e4b0a1b2c3d4e5f6");
        assert!(grant.matches(OLD_HASH));
    }

    #[test]
    fn test_reset_token_is_spent_once_password_changes() {
        let token = reset_token("secret", RESET_PURPOSE, 10);
        let grant = decode_reset_token(&token, "secret").unwrap();

        assert!(!grant.matches(NEW_HASH));
        assert!(!grant.matches(""));
        assert_eq!(password_fingerprint(OLD_HASH), "R9h/cIPz0gi.URNNX3kh2O");
    }

    #[test]
    fn test_reset_token_rejects_wrong_secret_or_purpose() {
        let token = reset_token("secret", RESET_PURPOSE, 10);
        assert!(decode_reset_token(&token, "other").is_err());

        let token = reset_token("secret", "login", 10);
        assert!(decode_reset_token(&token, "secret").is_err());
    }

    #[test]
    fn test_reset_token_expired() {
        let token = reset_token("secret", RESET_PURPOSE, -10);
        assert!(decode_reset_token(&token, "secret").is_err());
    }
}
