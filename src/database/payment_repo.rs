use async_trait::async_trait;
use mongodb::{bson::doc, Collection, Database};
use tracing::warn;

use crate::errors::Result;
use crate::models::cart::Cart;
use crate::models::invoice::Invoice;
use crate::models::payment::{Payment, PaymentStatus};
use crate::models::user::User;
use crate::models::{parse_object_id, timestamp};
use crate::services::payment_service::PaymentRepo;

#[derive(Clone)]
pub struct MongoPaymentRepo {
    db: Database,
}

impl MongoPaymentRepo {
    pub fn new(db: Database) -> Self {
        MongoPaymentRepo { db }
    }

    fn payments(&self) -> Collection<Payment> {
        self.db.collection("payments")
    }

    fn invoices(&self) -> Collection<Invoice> {
        self.db.collection("invoices")
    }

    fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }
}

#[async_trait]
impl PaymentRepo for MongoPaymentRepo {
    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        self.payments().insert_one(payment).await?;
        Ok(())
    }

    async fn find_payment(&self, reference: &str) -> Result<Option<Payment>> {
        Ok(self.payments().find_one(doc! { "_id": reference }).await?)
    }

    async fn attach_authorization(
        &self,
        reference: &str,
        authorization_url: &str,
        access_code: &str,
    ) -> Result<()> {
        self.payments()
            .update_one(
                doc! { "_id": reference },
                doc! { "$set": {
                    "authorizationUrl": authorization_url,
                    "accessCode": access_code,
                    "updatedAt": timestamp(),
                } },
            )
            .await?;
        Ok(())
    }

    async fn delete_pending_payment(&self, reference: &str) -> Result<()> {
        self.payments()
            .delete_one(doc! { "_id": reference, "status": PaymentStatus::Pending.as_str() })
            .await?;
        Ok(())
    }

    async fn mark_completed(&self, reference: &str) -> Result<bool> {
        // The status filter makes the pending -> completed move happen once.
        let result = self
            .payments()
            .update_one(
                doc! { "_id": reference, "status": PaymentStatus::Pending.as_str() },
                doc! { "$set": {
                    "status": PaymentStatus::Completed.as_str(),
                    "updatedAt": timestamp(),
                } },
            )
            .await?;
        Ok(result.modified_count == 1)
    }

    async fn find_invoice(&self, reference: &str) -> Result<Option<Invoice>> {
        Ok(self.invoices().find_one(doc! { "_id": reference }).await?)
    }

    async fn upsert_invoice(&self, invoice: &Invoice) -> Result<()> {
        self.invoices()
            .replace_one(doc! { "_id": invoice.reference.as_str() }, invoice)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn add_pending_payment(&self, user_id: &str, reference: &str) -> Result<()> {
        let id = parse_object_id(user_id, "User")?;
        self.users()
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$addToSet": { "pendingPayments": reference },
                    "$set": { "updatedAt": timestamp() },
                },
            )
            .await?;
        Ok(())
    }

    async fn remove_pending_payment(&self, user_id: &str, reference: &str) -> Result<()> {
        let id = parse_object_id(user_id, "User")?;
        self.users()
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$pull": { "pendingPayments": reference },
                    "$set": { "updatedAt": timestamp() },
                },
            )
            .await?;
        Ok(())
    }

    async fn record_enrollment(
        &self,
        user_id: &str,
        reference: &str,
        track_ids: &[String],
        course_ids: &[String],
    ) -> Result<()> {
        let id = parse_object_id(user_id, "User")?;
        let result = self
            .users()
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$addToSet": {
                        "invoices": reference,
                        "enrolledTracks": { "$each": track_ids.to_vec() },
                        "enrolledCourses": { "$each": course_ids.to_vec() },
                    },
                    "$pull": { "pendingPayments": reference },
                    "$set": { "updatedAt": timestamp() },
                },
            )
            .await?;

        if result.matched_count == 0 {
            warn!("Invoice {} has no matching user {}", reference, user_id);
        }
        Ok(())
    }

    async fn clear_cart(&self, user_id: &str) -> Result<()> {
        self.db
            .collection::<Cart>("carts")
            .delete_one(doc! { "_id": user_id })
            .await?;
        Ok(())
    }
}
