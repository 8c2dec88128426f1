// services/payment_service.rs
//! Checkout flow: gateway transaction -> pending payment -> verified invoice
//! -> learner enrollment. Storage and gateway are traits so the flow can run
//! against MongoDB/Paystack in production and in-memory fakes in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::cart::{cart_total, enrollment_ids, CartItem};
use crate::models::invoice::Invoice;
use crate::models::payment::Payment;
use crate::models::to_minor_units;

const REFERENCE_PREFIX: &str = "CS";
const GATEWAY_SUCCESS: &str = "success";

#[derive(Debug, Clone)]
pub struct InitializeTransaction {
    pub reference: String,
    pub email: String,
    pub amount_minor: i64,
    pub currency: String,
    pub metadata: Value,
}

#[derive(Debug, Clone)]
pub struct GatewayTransaction {
    pub reference: String,
    pub authorization_url: String,
    pub access_code: String,
}

#[derive(Debug, Clone)]
pub struct VerifiedTransaction {
    pub reference: String,
    pub status: String,
    pub amount_minor: i64,
    pub currency: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub raw: Value,
}

impl VerifiedTransaction {
    pub fn is_success(&self) -> bool {
        self.status == GATEWAY_SUCCESS
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initialize(&self, request: &InitializeTransaction) -> Result<GatewayTransaction>;
    async fn verify(&self, reference: &str) -> Result<VerifiedTransaction>;
}

#[async_trait]
pub trait PaymentRepo: Send + Sync {
    /// Fails with `DuplicateKey` if the reference already exists.
    async fn insert_payment(&self, payment: &Payment) -> Result<()>;
    async fn find_payment(&self, reference: &str) -> Result<Option<Payment>>;
    async fn attach_authorization(
        &self,
        reference: &str,
        authorization_url: &str,
        access_code: &str,
    ) -> Result<()>;
    /// Removes a payment that is still pending.
    async fn delete_pending_payment(&self, reference: &str) -> Result<()>;
    /// Moves pending -> completed. Returns false if the payment was not pending.
    async fn mark_completed(&self, reference: &str) -> Result<bool>;

    async fn find_invoice(&self, reference: &str) -> Result<Option<Invoice>>;
    /// Writes the invoice under its reference, replacing any earlier copy.
    async fn upsert_invoice(&self, invoice: &Invoice) -> Result<()>;

    async fn add_pending_payment(&self, user_id: &str, reference: &str) -> Result<()>;
    async fn remove_pending_payment(&self, user_id: &str, reference: &str) -> Result<()>;
    /// Array-union the invoice and purchased items, array-remove the pending reference.
    async fn record_enrollment(
        &self,
        user_id: &str,
        reference: &str,
        track_ids: &[String],
        course_ids: &[String],
    ) -> Result<()>;
    async fn clear_cart(&self, user_id: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: String,
    pub email: String,
    pub amount: f64,
    pub reference: Option<String>,
    pub cart_items: Vec<CartItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub reference: String,
    pub authorization_url: String,
    pub access_code: String,
    pub amount: f64,
    pub cart_total: f64,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub enum VerificationOutcome {
    Completed(Invoice),
    AlreadyCompleted(Invoice),
}

impl VerificationOutcome {
    pub fn invoice(&self) -> &Invoice {
        match self {
            VerificationOutcome::Completed(invoice) => invoice,
            VerificationOutcome::AlreadyCompleted(invoice) => invoice,
        }
    }

    pub fn into_invoice(self) -> Invoice {
        match self {
            VerificationOutcome::Completed(invoice) => invoice,
            VerificationOutcome::AlreadyCompleted(invoice) => invoice,
        }
    }
}

pub fn generate_reference() -> String {
    format!("{}-{}", REFERENCE_PREFIX, Uuid::new_v4().simple())
}

pub struct PaymentService {
    gateway: Arc<dyn PaymentGateway>,
    repo: Arc<dyn PaymentRepo>,
    currency: String,
}

impl PaymentService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        repo: Arc<dyn PaymentRepo>,
        currency: impl Into<String>,
    ) -> Self {
        PaymentService {
            gateway,
            repo,
            currency: currency.into(),
        }
    }

    pub async fn initialize(&self, request: CheckoutRequest) -> Result<CheckoutSession> {
        if request.cart_items.is_empty() {
            return Err(AppError::invalid_data("Cart is empty"));
        }

        let total = cart_total(&request.cart_items);
        if request.amount <= 0.0 {
            return Err(AppError::invalid_data("Amount must be greater than 0"));
        }
        if to_minor_units(request.amount) > to_minor_units(total) {
            return Err(AppError::invalid_data(format!(
                "Amount {} exceeds cart total {}",
                request.amount, total
            )));
        }

        let reference = request
            .reference
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(generate_reference);

        let payment = Payment::new_pending(
            reference.clone(),
            request.user_id.clone(),
            request.email.clone(),
            request.amount,
            self.currency.clone(),
            request.cart_items,
        );

        self.repo.insert_payment(&payment).await?;

        if let Err(e) = self.repo.add_pending_payment(&payment.user_id, &reference).await {
            self.discard_pending(&payment).await;
            return Err(e);
        }

        let init = InitializeTransaction {
            reference: reference.clone(),
            email: payment.email.clone(),
            amount_minor: to_minor_units(payment.amount),
            currency: payment.currency.clone(),
            metadata: json!({
                "userId": payment.user_id,
                "cartItems": payment.cart_items,
            }),
        };

        let transaction = match self.gateway.initialize(&init).await {
            Ok(transaction) if transaction.reference == reference => transaction,
            Ok(transaction) => {
                warn!(
                    "Gateway answered {} with reference {}, discarding pending payment",
                    reference, transaction.reference
                );
                self.discard_pending(&payment).await;
                return Err(AppError::gateway("initialize returned a different reference"));
            }
            Err(e) => {
                warn!("Gateway rejected {}, discarding pending payment: {}", reference, e);
                self.discard_pending(&payment).await;
                return Err(e);
            }
        };

        if let Err(e) = self
            .repo
            .attach_authorization(&reference, &transaction.authorization_url, &transaction.access_code)
            .await
        {
            // The pending record already exists, verification does not need the URL.
            warn!("Failed to store authorization URL for {}: {}", reference, e);
        }

        info!("Checkout {} initialized for user {}", reference, payment.user_id);

        Ok(CheckoutSession {
            reference,
            authorization_url: transaction.authorization_url,
            access_code: transaction.access_code,
            amount: payment.amount,
            cart_total: total,
            currency: payment.currency,
        })
    }

    async fn discard_pending(&self, payment: &Payment) {
        if let Err(e) = self.repo.delete_pending_payment(&payment.reference).await {
            warn!("Failed to delete pending payment {}: {}", payment.reference, e);
        }
        if let Err(e) = self
            .repo
            .remove_pending_payment(&payment.user_id, &payment.reference)
            .await
        {
            warn!("Failed to unlink pending payment {}: {}", payment.reference, e);
        }
    }

    pub async fn verify(&self, reference: &str) -> Result<VerificationOutcome> {
        let payment = self
            .repo
            .find_payment(reference)
            .await?
            .ok_or_else(|| AppError::not_found("Payment"))?;

        let repairing = payment.is_completed();
        if repairing {
            if let Some(invoice) = self.repo.find_invoice(reference).await? {
                info!("Payment {} already completed", reference);
                return Ok(VerificationOutcome::AlreadyCompleted(invoice));
            }
            // Completed without an invoice: an earlier run stopped halfway.
            warn!("Payment {} is completed but has no invoice, rebuilding", reference);
        }

        let transaction = self.gateway.verify(reference).await?;
        if transaction.reference != reference {
            return Err(AppError::gateway(format!(
                "verify for {} returned reference {}",
                reference, transaction.reference
            )));
        }
        if !transaction.is_success() {
            return Err(AppError::PaymentNotSuccessful(transaction.status));
        }

        let expected = to_minor_units(payment.amount);
        if transaction.amount_minor != expected {
            return Err(AppError::AmountMismatch {
                expected,
                reported: transaction.amount_minor,
            });
        }
        if !transaction.currency.eq_ignore_ascii_case(&payment.currency) {
            return Err(AppError::CurrencyMismatch {
                expected: payment.currency,
                reported: transaction.currency,
            });
        }

        // Only the caller that moves pending -> completed applies side effects.
        if !repairing && !self.repo.mark_completed(reference).await? {
            return match self.repo.find_invoice(reference).await? {
                Some(invoice) => Ok(VerificationOutcome::AlreadyCompleted(invoice)),
                None => {
                    info!("Payment {} is being completed by another request", reference);
                    Err(AppError::PaymentInProgress(reference.to_string()))
                }
            };
        }

        let payment = self
            .repo
            .find_payment(reference)
            .await?
            .ok_or_else(|| AppError::not_found("Payment"))?;

        let paid_at = transaction.paid_at.unwrap_or_else(Utc::now);
        let invoice = Invoice::from_payment(&payment, transaction.raw, paid_at);
        self.repo.upsert_invoice(&invoice).await?;

        let (track_ids, course_ids) = enrollment_ids(&payment.cart_items);
        self.repo
            .record_enrollment(&payment.user_id, reference, &track_ids, &course_ids)
            .await?;

        if let Err(e) = self.repo.clear_cart(&payment.user_id).await {
            warn!("Failed to clear cart for {}: {}", payment.user_id, e);
        }

        info!("Payment {} verified, invoice created", reference);
        Ok(VerificationOutcome::Completed(invoice))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::cart::ItemType;
    use crate::models::invoice::InvoiceStatus;
    use crate::models::payment::PaymentStatus;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Default, Clone)]
    pub struct UserArrays {
        pub invoices: Vec<String>,
        pub pending_payments: Vec<String>,
        pub enrolled_tracks: Vec<String>,
        pub enrolled_courses: Vec<String>,
    }

    fn add_to_set(target: &mut Vec<String>, value: &str) {
        if !target.iter().any(|v| v == value) {
            target.push(value.to_string());
        }
    }

    #[derive(Default)]
    pub struct MemoryRepo {
        pub payments: Mutex<HashMap<String, Payment>>,
        pub invoices: Mutex<HashMap<String, Invoice>>,
        pub users: Mutex<HashMap<String, UserArrays>>,
        pub carts: Mutex<HashMap<String, Vec<CartItem>>>,
        pub invoice_writes: AtomicUsize,
        pub fail_pending_link: bool,
        /// Another request completes the payment just before ours does.
        pub lose_race: bool,
    }

    #[async_trait]
    impl PaymentRepo for MemoryRepo {
        async fn insert_payment(&self, payment: &Payment) -> Result<()> {
            let mut payments = self.payments.lock().unwrap();
            if payments.contains_key(&payment.reference) {
                return Err(AppError::DuplicateKey(payment.reference.clone()));
            }
            payments.insert(payment.reference.clone(), payment.clone());
            Ok(())
        }

        async fn find_payment(&self, reference: &str) -> Result<Option<Payment>> {
            Ok(self.payments.lock().unwrap().get(reference).cloned())
        }

        async fn attach_authorization(&self, reference: &str, url: &str, code: &str) -> Result<()> {
            if let Some(p) = self.payments.lock().unwrap().get_mut(reference) {
                p.authorization_url = Some(url.to_string());
                p.access_code = Some(code.to_string());
            }
            Ok(())
        }

        async fn delete_pending_payment(&self, reference: &str) -> Result<()> {
            let mut payments = self.payments.lock().unwrap();
            if payments.get(reference).map(|p| !p.is_completed()).unwrap_or(false) {
                payments.remove(reference);
            }
            Ok(())
        }

        async fn mark_completed(&self, reference: &str) -> Result<bool> {
            let mut payments = self.payments.lock().unwrap();
            match payments.get_mut(reference) {
                Some(p) if p.status.can_become(PaymentStatus::Completed) => {
                    p.status = PaymentStatus::Completed;
                    p.updated_at = Utc::now();
                    Ok(!self.lose_race)
                }
                _ => Ok(false),
            }
        }

        async fn find_invoice(&self, reference: &str) -> Result<Option<Invoice>> {
            Ok(self.invoices.lock().unwrap().get(reference).cloned())
        }

        async fn upsert_invoice(&self, invoice: &Invoice) -> Result<()> {
            self.invoice_writes.fetch_add(1, Ordering::SeqCst);
            self.invoices
                .lock()
                .unwrap()
                .insert(invoice.reference.clone(), invoice.clone());
            Ok(())
        }

        async fn add_pending_payment(&self, user_id: &str, reference: &str) -> Result<()> {
            if self.fail_pending_link {
                return Err(AppError::service("users collection unavailable"));
            }
            let mut users = self.users.lock().unwrap();
            add_to_set(&mut users.entry(user_id.to_string()).or_default().pending_payments, reference);
            Ok(())
        }

        async fn remove_pending_payment(&self, user_id: &str, reference: &str) -> Result<()> {
            if let Some(user) = self.users.lock().unwrap().get_mut(user_id) {
                user.pending_payments.retain(|r| r != reference);
            }
            Ok(())
        }

        async fn record_enrollment(
            &self,
            user_id: &str,
            reference: &str,
            track_ids: &[String],
            course_ids: &[String],
        ) -> Result<()> {
            let mut users = self.users.lock().unwrap();
            let user = users.entry(user_id.to_string()).or_default();
            add_to_set(&mut user.invoices, reference);
            for id in track_ids {
                add_to_set(&mut user.enrolled_tracks, id);
            }
            for id in course_ids {
                add_to_set(&mut user.enrolled_courses, id);
            }
            user.pending_payments.retain(|r| r != reference);
            Ok(())
        }

        async fn clear_cart(&self, user_id: &str) -> Result<()> {
            self.carts.lock().unwrap().remove(user_id);
            Ok(())
        }
    }

    pub struct FakeGateway {
        pub status: String,
        pub fail_initialize: bool,
        /// Overrides the amount echoed back by verify.
        pub reported_amount: Option<i64>,
        pub reported_currency: Option<String>,
        pub initialized: Mutex<HashMap<String, i64>>,
        pub verify_calls: AtomicUsize,
    }

    impl FakeGateway {
        pub fn new(status: &str) -> Self {
            FakeGateway {
                status: status.to_string(),
                fail_initialize: false,
                reported_amount: None,
                reported_currency: None,
                initialized: Mutex::new(HashMap::new()),
                verify_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn initialize(&self, request: &InitializeTransaction) -> Result<GatewayTransaction> {
            if self.fail_initialize {
                return Err(AppError::gateway("initialize failed: Invalid key"));
            }
            self.initialized
                .lock()
                .unwrap()
                .insert(request.reference.clone(), request.amount_minor);
            Ok(GatewayTransaction {
                reference: request.reference.clone(),
                authorization_url: format!("https://checkout.test/{}", request.reference),
                access_code: "ac_test".to_string(),
            })
        }

        async fn verify(&self, reference: &str) -> Result<VerifiedTransaction> {
            self.verify_calls.fetch_add(1, Ordering::SeqCst);
            let amount = self
                .reported_amount
                .or_else(|| self.initialized.lock().unwrap().get(reference).copied())
                .unwrap_or(0);
            Ok(VerifiedTransaction {
                reference: reference.to_string(),
                status: self.status.clone(),
                amount_minor: amount,
                currency: self.reported_currency.clone().unwrap_or_else(|| "NGN".to_string()),
                paid_at: Some(Utc::now()),
                raw: json!({ "reference": reference, "status": self.status }),
            })
        }
    }

    fn items() -> Vec<CartItem> {
        vec![
            CartItem {
                item_id: "track-1".into(),
                item_type: ItemType::Track,
                title: "Backend Track".into(),
                price: 50000.0,
            },
            CartItem {
                item_id: "course-9".into(),
                item_type: ItemType::Course,
                title: "SQL Basics".into(),
                price: 15000.0,
            },
        ]
    }

    fn checkout(amount: f64, reference: Option<&str>) -> CheckoutRequest {
        CheckoutRequest {
            user_id: "user-1".into(),
            email: "learner@example.com".into(),
            amount,
            reference: reference.map(String::from),
            cart_items: items(),
        }
    }

    fn service(gateway: Arc<FakeGateway>, repo: Arc<MemoryRepo>) -> PaymentService {
        PaymentService::new(gateway, repo, "NGN")
    }

    #[tokio::test]
    async fn test_initialize_stores_pending_payment() {
        let gateway = Arc::new(FakeGateway::new("success"));
        let repo = Arc::new(MemoryRepo::default());
        let service = service(gateway.clone(), repo.clone());

        let session = service.initialize(checkout(65000.0, Some("CS-ref-1"))).await.unwrap();

        assert_eq!(session.reference, "CS-ref-1");
        assert_eq!(session.authorization_url, "https://checkout.test/CS-ref-1");
        assert_eq!(gateway.initialized.lock().unwrap()["CS-ref-1"], 6_500_000);

        let payment = repo.find_payment("CS-ref-1").await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.authorization_url.as_deref(), Some("https://checkout.test/CS-ref-1"));
        assert_eq!(repo.users.lock().unwrap()["user-1"].pending_payments, vec!["CS-ref-1"]);
    }

    #[tokio::test]
    async fn test_initialize_generates_reference() {
        let repo = Arc::new(MemoryRepo::default());
        let service = service(Arc::new(FakeGateway::new("success")), repo.clone());

        let session = service.initialize(checkout(65000.0, None)).await.unwrap();
        assert!(session.reference.starts_with("CS-"));
        assert!(repo.find_payment(&session.reference).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_no_pending_record() {
        let mut gateway = FakeGateway::new("success");
        gateway.fail_initialize = true;
        let repo = Arc::new(MemoryRepo::default());
        let service = service(Arc::new(gateway), repo.clone());

        let err = service.initialize(checkout(65000.0, Some("CS-fail"))).await.unwrap_err();

        assert!(matches!(err, AppError::PaymentGateway(_)));
        assert!(repo.find_payment("CS-fail").await.unwrap().is_none());
        assert!(repo.users.lock().unwrap()["user-1"].pending_payments.is_empty());
    }

    #[tokio::test]
    async fn test_user_link_failure_discards_payment() {
        let repo = Arc::new(MemoryRepo { fail_pending_link: true, ..Default::default() });
        let gateway = Arc::new(FakeGateway::new("success"));
        let service = service(gateway.clone(), repo.clone());

        assert!(service.initialize(checkout(65000.0, Some("CS-x"))).await.is_err());
        assert!(repo.find_payment("CS-x").await.unwrap().is_none());
        assert!(gateway.initialized.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_reference_rejected() {
        let repo = Arc::new(MemoryRepo::default());
        let service = service(Arc::new(FakeGateway::new("success")), repo);

        service.initialize(checkout(65000.0, Some("CS-dup"))).await.unwrap();
        let err = service.initialize(checkout(65000.0, Some("CS-dup"))).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn test_initialize_rejects_bad_amounts() {
        let service = service(Arc::new(FakeGateway::new("success")), Arc::new(MemoryRepo::default()));

        assert!(service.initialize(checkout(0.0, None)).await.is_err());
        assert!(service.initialize(checkout(65000.01, None)).await.is_err());

        let mut empty = checkout(100.0, None);
        empty.cart_items.clear();
        assert!(service.initialize(empty).await.is_err());
    }

    #[tokio::test]
    async fn test_verify_creates_invoice_and_enrolls() {
        let repo = Arc::new(MemoryRepo::default());
        repo.carts.lock().unwrap().insert("user-1".into(), items());
        let service = service(Arc::new(FakeGateway::new("success")), repo.clone());
        service.initialize(checkout(65000.0, Some("CS-ok"))).await.unwrap();

        let outcome = service.verify("CS-ok").await.unwrap();
        assert!(matches!(outcome, VerificationOutcome::Completed(_)));

        let invoice = outcome.into_invoice();
        let payment = repo.find_payment("CS-ok").await.unwrap().unwrap();
        assert_eq!(invoice.reference, payment.reference);
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.cart_total, 65000.0);
        assert_eq!(payment.status, PaymentStatus::Completed);

        let users = repo.users.lock().unwrap();
        let user = &users["user-1"];
        assert_eq!(user.invoices, vec!["CS-ok"]);
        assert!(user.pending_payments.is_empty());
        assert_eq!(user.enrolled_tracks, vec!["track-1"]);
        assert_eq!(user.enrolled_courses, vec!["course-9"]);
        assert!(repo.carts.lock().unwrap().get("user-1").is_none());
    }

    #[tokio::test]
    async fn test_partial_payment_invoice() {
        let repo = Arc::new(MemoryRepo::default());
        let service = service(Arc::new(FakeGateway::new("success")), repo);
        service.initialize(checkout(20000.0, Some("CS-part"))).await.unwrap();

        let invoice = service.verify("CS-part").await.unwrap().into_invoice();
        assert_eq!(invoice.amount, 20000.0);
        assert_eq!(invoice.balance_due, 45000.0);
        assert_eq!(invoice.amount + invoice.balance_due, invoice.cart_total);
    }

    #[tokio::test]
    async fn test_repeat_verify_does_not_double_append() {
        let repo = Arc::new(MemoryRepo::default());
        let gateway = Arc::new(FakeGateway::new("success"));
        let service = service(gateway.clone(), repo.clone());
        service.initialize(checkout(65000.0, Some("CS-twice"))).await.unwrap();

        service.verify("CS-twice").await.unwrap();
        let second = service.verify("CS-twice").await.unwrap();

        assert!(matches!(second, VerificationOutcome::AlreadyCompleted(_)));
        assert_eq!(second.invoice().reference, "CS-twice");
        assert_eq!(gateway.verify_calls.load(Ordering::SeqCst), 1);
        assert_eq!(repo.invoice_writes.load(Ordering::SeqCst), 1);
        assert_eq!(repo.users.lock().unwrap()["user-1"].invoices.len(), 1);
    }

    /// Yields to the scheduler before every call so concurrent verifies interleave.
    struct YieldingRepo(Arc<MemoryRepo>);

    #[async_trait]
    impl PaymentRepo for YieldingRepo {
        async fn insert_payment(&self, payment: &Payment) -> Result<()> {
            tokio::task::yield_now().await;
            self.0.insert_payment(payment).await
        }

        async fn find_payment(&self, reference: &str) -> Result<Option<Payment>> {
            tokio::task::yield_now().await;
            self.0.find_payment(reference).await
        }

        async fn attach_authorization(&self, reference: &str, url: &str, code: &str) -> Result<()> {
            tokio::task::yield_now().await;
            self.0.attach_authorization(reference, url, code).await
        }

        async fn delete_pending_payment(&self, reference: &str) -> Result<()> {
            tokio::task::yield_now().await;
            self.0.delete_pending_payment(reference).await
        }

        async fn mark_completed(&self, reference: &str) -> Result<bool> {
            tokio::task::yield_now().await;
            self.0.mark_completed(reference).await
        }

        async fn find_invoice(&self, reference: &str) -> Result<Option<Invoice>> {
            tokio::task::yield_now().await;
            self.0.find_invoice(reference).await
        }

        async fn upsert_invoice(&self, invoice: &Invoice) -> Result<()> {
            tokio::task::yield_now().await;
            self.0.upsert_invoice(invoice).await
        }

        async fn add_pending_payment(&self, user_id: &str, reference: &str) -> Result<()> {
            tokio::task::yield_now().await;
            self.0.add_pending_payment(user_id, reference).await
        }

        async fn remove_pending_payment(&self, user_id: &str, reference: &str) -> Result<()> {
            tokio::task::yield_now().await;
            self.0.remove_pending_payment(user_id, reference).await
        }

        async fn record_enrollment(
            &self,
            user_id: &str,
            reference: &str,
            track_ids: &[String],
            course_ids: &[String],
        ) -> Result<()> {
            tokio::task::yield_now().await;
            self.0.record_enrollment(user_id, reference, track_ids, course_ids).await
        }

        async fn clear_cart(&self, user_id: &str) -> Result<()> {
            tokio::task::yield_now().await;
            self.0.clear_cart(user_id).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_verify_single_invoice() {
        let memory = Arc::new(MemoryRepo::default());
        let service = PaymentService::new(
            Arc::new(FakeGateway::new("success")),
            Arc::new(YieldingRepo(memory.clone())),
            "NGN",
        );
        service.initialize(checkout(65000.0, Some("CS-race"))).await.unwrap();

        let (a, b) = tokio::join!(service.verify("CS-race"), service.verify("CS-race"));
        let outcomes = [a, b];

        let completed = outcomes
            .iter()
            .filter(|o| matches!(o, Ok(VerificationOutcome::Completed(_))))
            .count();
        assert_eq!(completed, 1);
        for outcome in &outcomes {
            match outcome {
                Ok(outcome) => assert_eq!(outcome.invoice().reference, "CS-race"),
                Err(e) => assert!(matches!(e, AppError::PaymentInProgress(r) if r == "CS-race")),
            }
        }

        assert_eq!(memory.invoice_writes.load(Ordering::SeqCst), 1);
        assert_eq!(memory.invoices.lock().unwrap().len(), 1);
        assert_eq!(memory.users.lock().unwrap()["user-1"].invoices, vec!["CS-race"]);
    }

    #[tokio::test]
    async fn test_lost_race_leaves_refilled_cart_alone() {
        let repo = Arc::new(MemoryRepo { lose_race: true, ..Default::default() });
        let service = service(Arc::new(FakeGateway::new("success")), repo.clone());
        service.initialize(checkout(65000.0, Some("CS-late"))).await.unwrap();
        repo.carts.lock().unwrap().insert("user-1".into(), items());

        let err = service.verify("CS-late").await.unwrap_err();

        assert!(matches!(err, AppError::PaymentInProgress(ref r) if r == "CS-late"));
        assert_eq!(repo.invoice_writes.load(Ordering::SeqCst), 0);
        assert!(repo.users.lock().unwrap()["user-1"].invoices.is_empty());
        assert_eq!(repo.carts.lock().unwrap()["user-1"].len(), 2);
    }

    #[tokio::test]
    async fn test_failed_gateway_status_keeps_pending() {
        let repo = Arc::new(MemoryRepo::default());
        let service = service(Arc::new(FakeGateway::new("abandoned")), repo.clone());
        service.initialize(checkout(65000.0, Some("CS-aband"))).await.unwrap();

        let err = service.verify("CS-aband").await.unwrap_err();
        assert!(matches!(err, AppError::PaymentNotSuccessful(ref s) if s == "abandoned"));

        let payment = repo.find_payment("CS-aband").await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(repo.find_invoice("CS-aband").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_amount_mismatch_is_rejected() {
        let mut gateway = FakeGateway::new("success");
        gateway.reported_amount = Some(100);
        let repo = Arc::new(MemoryRepo::default());
        let service = service(Arc::new(gateway), repo.clone());
        service.initialize(checkout(65000.0, Some("CS-short"))).await.unwrap();

        let err = service.verify("CS-short").await.unwrap_err();
        assert!(matches!(err, AppError::AmountMismatch { expected: 6_500_000, reported: 100 }));
        assert_eq!(
            repo.find_payment("CS-short").await.unwrap().unwrap().status,
            PaymentStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_currency_mismatch_is_rejected() {
        let mut gateway = FakeGateway::new("success");
        gateway.reported_currency = Some("USD".into());
        let repo = Arc::new(MemoryRepo::default());
        let service = service(Arc::new(gateway), repo.clone());
        service.initialize(checkout(65000.0, Some("CS-usd"))).await.unwrap();

        let err = service.verify("CS-usd").await.unwrap_err();
        assert!(matches!(err, AppError::CurrencyMismatch { ref reported, .. } if reported == "USD"));
        assert!(!repo.find_payment("CS-usd").await.unwrap().unwrap().is_completed());
        assert!(repo.find_invoice("CS-usd").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_verify_unknown_reference() {
        let service = service(Arc::new(FakeGateway::new("success")), Arc::new(MemoryRepo::default()));
        let err = service.verify("CS-missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_completed_without_invoice_is_repaired() {
        let repo = Arc::new(MemoryRepo::default());
        let service = service(Arc::new(FakeGateway::new("success")), repo.clone());
        service.initialize(checkout(65000.0, Some("CS-half"))).await.unwrap();
        repo.mark_completed("CS-half").await.unwrap();

        let outcome = service.verify("CS-half").await.unwrap();
        assert_eq!(outcome.invoice().reference, "CS-half");
        assert!(repo.find_invoice("CS-half").await.unwrap().is_some());
        assert_eq!(repo.users.lock().unwrap()["user-1"].invoices, vec!["CS-half"]);
    }
}
