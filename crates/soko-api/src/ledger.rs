use std::sync::Arc;

use chrono::Utc;
use soko_core::adapters::{DatabaseAdapter, NotificationAdapter};
use soko_core::{
    CreateSubscription, MarketError, MarketResult, NotificationKind, Plan, Subscription,
};

use crate::catalog::PlanCatalog;
use crate::market::notify_or_log;

/// Subscription Ledger: owns subscription state and the quota counter.
///
/// The single-active-subscription invariant is enforced here procedurally,
/// at the moments subscriptions are created or switched; storage carries no
/// uniqueness constraint for it.
#[derive(Clone)]
pub struct SubscriptionLedger {
    database: Arc<dyn DatabaseAdapter>,
    catalog: PlanCatalog,
    notifier: Option<Arc<dyn NotificationAdapter>>,
}

impl SubscriptionLedger {
    pub(crate) fn new(
        database: Arc<dyn DatabaseAdapter>,
        catalog: PlanCatalog,
        notifier: Option<Arc<dyn NotificationAdapter>>,
    ) -> Self {
        Self {
            database,
            catalog,
            notifier,
        }
    }

    /// The user's currently-active subscription, if any. A stored `active`
    /// row that has time-expired reads as absent; the row is not rewritten.
    pub async fn get_active_subscription(
        &self,
        user_id: &str,
    ) -> MarketResult<Option<Subscription>> {
        self.database.get_active_subscription(user_id).await
    }

    /// Active subscription together with its plan, for client display.
    pub async fn current_subscription(
        &self,
        user_id: &str,
    ) -> MarketResult<Option<(Subscription, Plan)>> {
        match self.database.get_active_subscription(user_id).await? {
            Some(sub) => {
                let plan = self.catalog.get_plan(&sub.plan_id).await?;
                Ok(Some((sub, plan)))
            }
            None => Ok(None),
        }
    }

    /// Consume one quota unit. Fails with `QuotaExceeded` when no quota
    /// remains at commit time, including under concurrent callers.
    pub async fn consume_quota(&self, subscription_id: &str) -> MarketResult<Subscription> {
        self.database.consume_quota(subscription_id).await
    }

    /// Return one quota unit, floored at zero.
    pub async fn release_quota(&self, subscription_id: &str) -> MarketResult<Subscription> {
        self.database.release_quota(subscription_id).await
    }

    /// Apply a confirmed payment for `plan_id` to the user's ledger.
    ///
    /// Renewal (an active subscription already on this exact plan): stack
    /// `duration_days` on remaining time, or restart from now if already
    /// past expiry. Switch (no such subscription): cancel every other
    /// active subscription with immediate expiry, then create a fresh one.
    /// When a target listing is named it is activated under the new expiry,
    /// the plan's featured flag is granted (never revoked), and one quota
    /// unit is consumed. All of this is one atomic storage operation.
    pub async fn apply_payment(
        &self,
        user_id: &str,
        plan_id: &str,
        target_listing_id: Option<&str>,
    ) -> MarketResult<Subscription> {
        let plan = self.catalog.get_plan(plan_id).await?;
        if !plan.is_active {
            return Err(MarketError::validation(
                "Plan is not available for purchase",
            ));
        }

        // Reject before any mutation: a bad target must leave the ledger
        // untouched.
        if let Some(listing_id) = target_listing_id {
            let listing = self
                .database
                .get_listing(listing_id)
                .await?
                .ok_or_else(|| MarketError::not_found("Listing not found"))?;
            if listing.user_id != user_id {
                return Err(MarketError::forbidden(
                    "Listing does not belong to the paying user",
                ));
            }
        }

        let subscription = self
            .database
            .reconcile_plan_purchase(user_id, &plan, target_listing_id)
            .await?;

        tracing::info!(
            user = user_id,
            plan = %plan.name,
            subscription = %subscription.id,
            "Applied plan purchase to ledger"
        );

        notify_or_log(
            &self.notifier,
            user_id,
            NotificationKind::SubscriptionUpdated,
            serde_json::json!({
                "plan": plan.name,
                "expiresAt": subscription.expires_at,
            }),
        )
        .await;

        Ok(subscription)
    }

    /// Assign the default free-plan subscription to a verified user.
    ///
    /// Skipped for administrative accounts and for users who already hold
    /// an active subscription; safe to invoke on every verification event.
    pub async fn ensure_default_subscription(
        &self,
        user_id: &str,
    ) -> MarketResult<Option<Subscription>> {
        let user = self
            .database
            .get_user(user_id)
            .await?
            .ok_or_else(|| MarketError::not_found("User not found"))?;

        if user.is_admin || !user.is_verified {
            return Ok(None);
        }

        if let Some(existing) = self.database.get_active_subscription(user_id).await? {
            return Ok(Some(existing));
        }

        let plan = self.catalog.ensure_free_plan().await?;
        let subscription = self
            .database
            .create_subscription(CreateSubscription {
                user_id: user_id.to_string(),
                plan_id: plan.id.clone(),
                starts_at: Utc::now(),
                // The free plan itself never lapses; its duration only
                // bounds listings created under it.
                expires_at: None,
                auto_renew: false,
            })
            .await?;

        tracing::info!(user = user_id, plan = %plan.name, "Assigned default subscription");

        notify_or_log(
            &self.notifier,
            user_id,
            NotificationKind::SubscriptionAssigned,
            serde_json::json!({ "plan": plan.name }),
        )
        .await;

        Ok(Some(subscription))
    }
}
