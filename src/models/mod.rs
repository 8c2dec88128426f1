use chrono::{SecondsFormat, Utc};
use mongodb::bson::{oid::ObjectId, Bson};

use crate::errors::{AppError, Result};

pub mod cart;
pub mod course;
pub mod invoice;
pub mod otp;
pub mod payment;
pub mod review;
pub mod track;
pub mod user;

/// Current time in the same string form chrono's serde impl writes, so
/// `$set` updates stay readable as `DateTime<Utc>`.
pub fn timestamp() -> Bson {
    Bson::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
}

pub fn parse_object_id(id: &str, what: &str) -> Result<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| AppError::InvalidObjectId(format!("{} id '{}'", what, id)))
}

/// Amount in minor currency units (kobo for NGN), as the gateway expects.
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_units_rounding() {
        assert_eq!(to_minor_units(150.0), 15000);
        assert_eq!(to_minor_units(19.99), 1999);
    }

    #[test]
    fn test_parse_object_id() {
        assert!(parse_object_id("65a1f0c2e4b0a1b2c3d4e5f6", "Track").is_ok());
        let err = parse_object_id("not-an-id", "Track").unwrap_err();
        assert!(matches!(err, AppError::InvalidObjectId(_)));
    }

    #[test]
    fn test_timestamp_parses_as_datetime() {
        let Bson::String(raw) = timestamp() else {
            panic!("timestamp must be a string");
        };
        assert!(raw.parse::<chrono::DateTime<Utc>>().is_ok());
    }
}
