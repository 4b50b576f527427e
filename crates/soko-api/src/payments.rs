use std::sync::Arc;

use chrono::Utc;
use soko_core::adapters::{DatabaseAdapter, NotificationAdapter};
use soko_core::{
    CreatePayment, InitiatePaymentRequest, MarketConfig, MarketError, MarketResult,
    NotificationKind, Payment, PaymentStatus,
};
use uuid::Uuid;
use validator::Validate;

use crate::ledger::SubscriptionLedger;
use crate::market::notify_or_log;

/// Payment Reconciliation: pending payment records and the confirmation
/// path that applies purchases to the ledger.
///
/// Gateway integration itself stays outside the engine; callers confirm or
/// fail a payment by reference once their gateway callback fires.
#[derive(Clone)]
pub struct PaymentReconciliation {
    database: Arc<dyn DatabaseAdapter>,
    config: Arc<MarketConfig>,
    ledger: SubscriptionLedger,
    notifier: Option<Arc<dyn NotificationAdapter>>,
}

impl PaymentReconciliation {
    pub(crate) fn new(
        database: Arc<dyn DatabaseAdapter>,
        config: Arc<MarketConfig>,
        ledger: SubscriptionLedger,
        notifier: Option<Arc<dyn NotificationAdapter>>,
    ) -> Self {
        Self {
            database,
            config,
            ledger,
            notifier,
        }
    }

    /// Open a pending payment for a plan purchase and hand back its record,
    /// reference included. The amount is read from the plan, never from the
    /// caller.
    pub async fn initiate_payment(
        &self,
        user_id: &str,
        request: InitiatePaymentRequest,
    ) -> MarketResult<Payment> {
        request.validate()?;

        let plan = self
            .database
            .get_plan(&request.plan_id)
            .await?
            .ok_or_else(|| MarketError::not_found("Plan not found"))?;
        if !plan.is_active {
            return Err(MarketError::validation(
                "Plan is not available for purchase",
            ));
        }

        if let Some(listing_id) = &request.listing_id {
            let listing = self
                .database
                .get_listing(listing_id)
                .await?
                .ok_or_else(|| MarketError::not_found("Listing not found"))?;
            if listing.user_id != user_id {
                return Err(MarketError::forbidden(
                    "You can only purchase plans for your own listings",
                ));
            }
        }

        let payment = self
            .database
            .create_payment(CreatePayment {
                user_id: user_id.to_string(),
                plan_id: plan.id.clone(),
                listing_id: request.listing_id,
                amount: plan.price,
                method: request.method,
                reference: self.new_reference(),
            })
            .await?;

        tracing::info!(
            user = user_id,
            plan = %plan.name,
            reference = %payment.reference,
            "Payment initiated"
        );

        Ok(payment)
    }

    /// Confirm the payment behind `reference` and apply the purchase.
    ///
    /// Ledger effects land first; the payment is only marked successful
    /// after reconciliation committed, so a reconciliation failure leaves
    /// the payment pending and the call retryable. Confirming an
    /// already-successful payment is a no-op returning the stored record.
    pub async fn confirm_payment(
        &self,
        user_id: &str,
        reference: &str,
    ) -> MarketResult<Payment> {
        let payment = self.lookup(user_id, reference).await?;

        match payment.status {
            PaymentStatus::Successful => return Ok(payment),
            PaymentStatus::Pending => {}
            PaymentStatus::Failed | PaymentStatus::Refunded => {
                return Err(MarketError::conflict(format!(
                    "Payment {reference} is {} and cannot be confirmed",
                    payment.status
                )));
            }
        }

        self.ledger
            .apply_payment(user_id, &payment.plan_id, payment.listing_id.as_deref())
            .await?;

        let transaction_id = format!(
            "TXN-{}",
            Uuid::new_v4().simple().to_string()[..12].to_uppercase()
        );
        let payment = self
            .database
            .mark_payment_successful(&payment.id, &transaction_id, Utc::now())
            .await?;

        tracing::info!(
            user = user_id,
            reference = %payment.reference,
            transaction = %transaction_id,
            "Payment confirmed"
        );

        notify_or_log(
            &self.notifier,
            user_id,
            NotificationKind::PaymentSuccessful,
            serde_json::json!({
                "reference": payment.reference,
                "amount": payment.amount,
            }),
        )
        .await;

        Ok(payment)
    }

    /// Record a gateway-reported failure. The ledger is untouched.
    pub async fn fail_payment(
        &self,
        user_id: &str,
        reference: &str,
        reason: &str,
    ) -> MarketResult<Payment> {
        let payment = self.lookup(user_id, reference).await?;

        if payment.status == PaymentStatus::Successful {
            return Err(MarketError::conflict(format!(
                "Payment {reference} already succeeded"
            )));
        }

        let payment = self.database.mark_payment_failed(&payment.id, reason).await?;

        tracing::warn!(
            user = user_id,
            reference = %payment.reference,
            reason,
            "Payment failed"
        );

        notify_or_log(
            &self.notifier,
            user_id,
            NotificationKind::PaymentFailed,
            serde_json::json!({
                "reference": payment.reference,
                "reason": reason,
            }),
        )
        .await;

        Ok(payment)
    }

    /// Owner-scoped payment fetch. Another user's payment reads as absent.
    pub async fn get_payment(&self, user_id: &str, payment_id: &str) -> MarketResult<Payment> {
        let payment = self
            .database
            .get_payment(payment_id)
            .await?
            .filter(|p| p.user_id == user_id)
            .ok_or_else(|| MarketError::not_found("Payment not found"))?;
        Ok(payment)
    }

    /// All payments made by `user_id`, newest first.
    pub async fn payment_history(&self, user_id: &str) -> MarketResult<Vec<Payment>> {
        self.database.list_user_payments(user_id).await
    }

    async fn lookup(&self, user_id: &str, reference: &str) -> MarketResult<Payment> {
        self.database
            .get_payment_by_reference(reference)
            .await?
            .filter(|p| p.user_id == user_id)
            .ok_or_else(|| MarketError::not_found("Payment not found"))
    }

    fn new_reference(&self) -> String {
        format!(
            "{}-{}",
            self.config.payment_reference_prefix,
            Uuid::new_v4().simple().to_string()[..10].to_uppercase()
        )
    }
}
