// services/paystack_service.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};

use crate::config::PaystackConfig;
use crate::errors::{AppError, Result};
use crate::services::payment_service::{
    GatewayTransaction, InitializeTransaction, PaymentGateway, VerifiedTransaction,
};

const GATEWAY_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Serialize)]
struct InitializeRequest<'a> {
    email: &'a str,
    amount: i64,
    reference: &'a str,
    currency: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_url: Option<&'a str>,
    metadata: &'a Value,
}

/// Every Paystack response is wrapped as `{ status, message, data }`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    access_code: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    reference: String,
    amount: i64,
    currency: String,
    paid_at: Option<DateTime<Utc>>,
    gateway_response: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PaystackService {
    config: PaystackConfig,
    client: Client,
}

impl PaystackService {
    pub fn new(config: PaystackConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(GATEWAY_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(PaystackService { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn read_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
        action: &str,
    ) -> Result<(T, Value)> {
        let status = response.status();
        let body: Value = response.json().await?;

        if !status.is_success() {
            let message = body["message"].as_str().unwrap_or("unknown error");
            error!("Paystack {} failed: {} - {}", action, status, message);
            return Err(AppError::gateway(format!("{} failed: {}", action, message)));
        }

        let envelope: Envelope<T> = serde_json::from_value(body.clone())
            .map_err(|e| AppError::gateway(format!("Unexpected {} response: {}", action, e)))?;

        if !envelope.status {
            error!("Paystack {} rejected: {}", action, envelope.message);
            return Err(AppError::gateway(envelope.message));
        }

        let data = envelope
            .data
            .ok_or_else(|| AppError::gateway(format!("{} response has no data", action)))?;
        Ok((data, body["data"].clone()))
    }
}

#[async_trait]
impl PaymentGateway for PaystackService {
    async fn initialize(&self, request: &InitializeTransaction) -> Result<GatewayTransaction> {
        info!(
            "Paystack: initializing {} for {} ({} minor units)",
            request.reference, request.email, request.amount_minor
        );

        let body = InitializeRequest {
            email: &request.email,
            amount: request.amount_minor,
            reference: &request.reference,
            currency: &request.currency,
            callback_url: self.config.callback_url.as_deref(),
            metadata: &request.metadata,
        };

        let response = self
            .client
            .post(self.url("/transaction/initialize"))
            .bearer_auth(&self.config.secret_key)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::gateway(format!("initialize request failed: {}", e)))?;

        let (data, _) = Self::read_envelope::<InitializeData>(response, "initialize").await?;
        info!("Paystack: transaction {} initialized", data.reference);

        Ok(GatewayTransaction {
            reference: data.reference,
            authorization_url: data.authorization_url,
            access_code: data.access_code,
        })
    }

    async fn verify(&self, reference: &str) -> Result<VerifiedTransaction> {
        info!("Paystack: verifying {}", reference);

        let response = self
            .client
            .get(self.url(&format!("/transaction/verify/{}", reference)))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(|e| AppError::gateway(format!("verify request failed: {}", e)))?;

        let (data, raw) = Self::read_envelope::<VerifyData>(response, "verify").await?;
        info!(
            "Paystack: {} is {} ({})",
            data.reference,
            data.status,
            data.gateway_response.as_deref().unwrap_or("-")
        );

        Ok(VerifiedTransaction {
            reference: data.reference,
            status: data.status,
            amount_minor: data.amount,
            currency: data.currency,
            paid_at: data.paid_at,
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> PaystackConfig {
        PaystackConfig {
            secret_key: "sk_test_x".into(),
            base_url: base_url.into(),
            callback_url: None,
            currency: "NGN".into(),
        }
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let service = PaystackService::new(config("https://api.paystack.co/")).unwrap();
        assert_eq!(
            service.url("/transaction/verify/CS-1"),
            "https://api.paystack.co/transaction/verify/CS-1"
        );
    }

    #[test]
    fn test_verify_payload_parses() {
        let body = serde_json::json!({
            "status": true,
            "message": "Verification successful",
            "data": {
                "id": 42,
                "status": "success",
                "reference": "CS-1",
                "amount": 500000,
                "currency": "NGN",
                "paid_at": "2024-03-01T10:15:00.000Z",
                "gateway_response": "Successful",
                "customer": { "email": "a@b.co" }
            }
        });
        let envelope: Envelope<VerifyData> = serde_json::from_value(body).unwrap();
        let data = envelope.data.unwrap();
        assert!(envelope.status);
        assert_eq!(data.status, "success");
        assert_eq!(data.amount, 500000);
        assert!(data.paid_at.is_some());
    }

    #[test]
    fn test_initialize_request_shape() {
        let metadata = serde_json::json!({ "userId": "u1" });
        let body = InitializeRequest {
            email: "a@b.co",
            amount: 150000,
            reference: "CS-1",
            currency: "NGN",
            callback_url: None,
            metadata: &metadata,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["amount"], 150000);
        assert!(json.get("callback_url").is_none());
        assert_eq!(json["metadata"]["userId"], "u1");
    }
}
