use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::{MarketError, MarketResult};
use crate::types::{
    CreateListing, CreatePayment, CreatePlan, CreateSubscription, CreateUser, Listing,
    ListingStatus, Payment, PaymentStatus, Plan, Subscription, SubscriptionStatus, User,
};

use super::DatabaseAdapter;

/// In-memory database adapter for tests and examples.
///
/// A single mutex guards the whole store, so every compound operation runs
/// as one critical section. That gives this adapter the same atomicity
/// guarantees the SQLx adapter gets from transactions and row locks.
#[derive(Default)]
pub struct MemoryDatabaseAdapter {
    store: Mutex<Store>,
}

#[derive(Default)]
struct Store {
    users: HashMap<String, User>,
    plans: HashMap<String, Plan>,
    subscriptions: HashMap<String, Subscription>,
    listings: HashMap<String, Listing>,
    payments: HashMap<String, Payment>,
}

impl MemoryDatabaseAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store {
    fn active_subscription(&self, user_id: &str, now: DateTime<Utc>) -> Option<&Subscription> {
        let mut candidates: Vec<&Subscription> = self
            .subscriptions
            .values()
            .filter(|s| s.user_id == user_id && s.is_active_at(now))
            .collect();
        candidates.sort_by_key(|s| s.created_at);
        candidates.pop()
    }

    fn quota_error(plan: &Plan, sub: &Subscription) -> MarketError {
        MarketError::QuotaExceeded {
            plan: plan.name.clone(),
            max_listings: plan.max_listings,
            used: sub.listings_used,
        }
    }

    fn consume_quota(&mut self, subscription_id: &str) -> MarketResult<Subscription> {
        let sub = self
            .subscriptions
            .get(subscription_id)
            .ok_or_else(|| MarketError::not_found("Subscription not found"))?
            .clone();
        let plan = self
            .plans
            .get(&sub.plan_id)
            .ok_or_else(|| MarketError::not_found("Plan not found"))?
            .clone();

        if !sub.has_quota(&plan) {
            return Err(Self::quota_error(&plan, &sub));
        }

        let sub = self.subscriptions.get_mut(subscription_id).unwrap();
        sub.listings_used += 1;
        sub.updated_at = Utc::now();
        Ok(sub.clone())
    }
}

#[async_trait]
impl DatabaseAdapter for MemoryDatabaseAdapter {
    async fn create_user(&self, create_user: CreateUser) -> MarketResult<User> {
        let mut store = self.store.lock().unwrap();
        let id = create_user.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = Utc::now();

        if store.users.values().any(|u| u.email == create_user.email) {
            return Err(MarketError::conflict("Email is already in use"));
        }

        let user = User {
            id: id.clone(),
            email: create_user.email,
            name: create_user.name,
            is_verified: create_user.is_verified,
            is_seller: false,
            is_admin: create_user.is_admin,
            created_at: now,
            updated_at: now,
        };
        store.users.insert(id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: &str) -> MarketResult<Option<User>> {
        let store = self.store.lock().unwrap();
        Ok(store.users.get(id).cloned())
    }

    async fn set_user_verified(&self, id: &str, verified: bool) -> MarketResult<User> {
        let mut store = self.store.lock().unwrap();
        let user = store
            .users
            .get_mut(id)
            .ok_or_else(|| MarketError::not_found("User not found"))?;
        user.is_verified = verified;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn create_plan(&self, create_plan: CreatePlan) -> MarketResult<Plan> {
        let mut store = self.store.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let plan = Plan {
            id: id.clone(),
            name: create_plan.name,
            description: create_plan.description,
            price: create_plan.price,
            duration_days: create_plan.duration_days,
            category_scope: create_plan.category_scope,
            max_listings: create_plan.max_listings,
            max_images_per_listing: create_plan.max_images_per_listing,
            is_featured: create_plan.is_featured,
            is_active: create_plan.is_active,
            created_at: now,
            updated_at: now,
        };
        store.plans.insert(id, plan.clone());
        Ok(plan)
    }

    async fn get_plan(&self, id: &str) -> MarketResult<Option<Plan>> {
        let store = self.store.lock().unwrap();
        Ok(store.plans.get(id).cloned())
    }

    async fn list_active_plans(&self) -> MarketResult<Vec<Plan>> {
        let store = self.store.lock().unwrap();
        let mut plans: Vec<Plan> = store.plans.values().filter(|p| p.is_active).cloned().collect();
        plans.sort_by(|a, b| a.price.cmp(&b.price));
        Ok(plans)
    }

    async fn find_free_plan(&self) -> MarketResult<Option<Plan>> {
        let store = self.store.lock().unwrap();
        let mut free: Vec<&Plan> = store
            .plans
            .values()
            .filter(|p| p.is_active && p.price.is_zero())
            .collect();
        free.sort_by_key(|p| p.created_at);
        Ok(free.first().map(|p| (*p).clone()))
    }

    async fn create_subscription(
        &self,
        create_sub: CreateSubscription,
    ) -> MarketResult<Subscription> {
        let mut store = self.store.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let subscription = Subscription {
            id: id.clone(),
            user_id: create_sub.user_id,
            plan_id: create_sub.plan_id,
            status: SubscriptionStatus::Active,
            listings_used: 0,
            starts_at: create_sub.starts_at,
            expires_at: create_sub.expires_at,
            auto_renew: create_sub.auto_renew,
            created_at: now,
            updated_at: now,
        };
        store.subscriptions.insert(id, subscription.clone());
        Ok(subscription)
    }

    async fn get_subscription(&self, id: &str) -> MarketResult<Option<Subscription>> {
        let store = self.store.lock().unwrap();
        Ok(store.subscriptions.get(id).cloned())
    }

    async fn get_active_subscription(&self, user_id: &str) -> MarketResult<Option<Subscription>> {
        let store = self.store.lock().unwrap();
        Ok(store.active_subscription(user_id, Utc::now()).cloned())
    }

    async fn consume_quota(&self, subscription_id: &str) -> MarketResult<Subscription> {
        let mut store = self.store.lock().unwrap();
        store.consume_quota(subscription_id)
    }

    async fn release_quota(&self, subscription_id: &str) -> MarketResult<Subscription> {
        let mut store = self.store.lock().unwrap();
        let sub = store
            .subscriptions
            .get_mut(subscription_id)
            .ok_or_else(|| MarketError::not_found("Subscription not found"))?;
        sub.listings_used = (sub.listings_used - 1).max(0);
        sub.updated_at = Utc::now();
        Ok(sub.clone())
    }

    async fn reconcile_plan_purchase(
        &self,
        user_id: &str,
        plan: &Plan,
        target_listing_id: Option<&str>,
    ) -> MarketResult<Subscription> {
        let mut store = self.store.lock().unwrap();
        let now = Utc::now();

        let existing_id = store
            .subscriptions
            .values()
            .filter(|s| {
                s.user_id == user_id
                    && s.plan_id == plan.id
                    && s.status == SubscriptionStatus::Active
            })
            .max_by_key(|s| s.created_at)
            .map(|s| s.id.clone());

        // Validate the target and its quota up front; nothing below may
        // partially apply. A renewal keeps its usage counter, a switch
        // starts from zero.
        if let Some(listing_id) = target_listing_id {
            if !store.listings.contains_key(listing_id) {
                return Err(MarketError::not_found("Listing not found"));
            }
            let used = existing_id
                .as_ref()
                .map(|id| store.subscriptions[id].listings_used)
                .unwrap_or(0);
            if plan.max_listings - used <= 0 {
                return Err(MarketError::QuotaExceeded {
                    plan: plan.name.clone(),
                    max_listings: plan.max_listings,
                    used,
                });
            }
        }

        let subscription_id = match existing_id {
            // Renewal: stack on remaining time, or restart from now.
            Some(id) => {
                let sub = store.subscriptions.get_mut(&id).unwrap();
                match sub.expires_at {
                    Some(expires_at) if expires_at > now => {
                        sub.expires_at =
                            Some(expires_at + chrono::Duration::days(plan.duration_days as i64));
                    }
                    _ => {
                        sub.starts_at = now;
                        sub.expires_at = plan.expiry_from(now);
                    }
                }
                sub.updated_at = now;
                id
            }
            // Switch: cancel everything else, then start fresh.
            None => {
                for sub in store
                    .subscriptions
                    .values_mut()
                    .filter(|s| s.user_id == user_id && s.status == SubscriptionStatus::Active)
                {
                    sub.status = SubscriptionStatus::Cancelled;
                    sub.expires_at = Some(now);
                    sub.updated_at = now;
                }

                let id = Uuid::new_v4().to_string();
                let subscription = Subscription {
                    id: id.clone(),
                    user_id: user_id.to_string(),
                    plan_id: plan.id.clone(),
                    status: SubscriptionStatus::Active,
                    listings_used: 0,
                    starts_at: now,
                    expires_at: plan.expiry_from(now),
                    auto_renew: false,
                    created_at: now,
                    updated_at: now,
                };
                store.subscriptions.insert(id.clone(), subscription);
                id
            }
        };

        if let Some(listing_id) = target_listing_id {
            // Quota was verified before any mutation above.
            let new_expiry = store.subscriptions[&subscription_id].expires_at;

            let listing = store.listings.get_mut(listing_id).unwrap();
            // Featured is granted, never revoked, by this path.
            if plan.is_featured {
                listing.is_featured = true;
            }
            listing.expiration_date = new_expiry;
            listing.status = ListingStatus::Active;
            listing.updated_at = now;

            let sub = store.subscriptions.get_mut(&subscription_id).unwrap();
            sub.listings_used += 1;
            sub.updated_at = now;
        }

        Ok(store.subscriptions.get(&subscription_id).unwrap().clone())
    }

    async fn create_active_listing(
        &self,
        create_listing: CreateListing,
        subscription_id: &str,
        expiration_date: Option<DateTime<Utc>>,
        featured: bool,
    ) -> MarketResult<(Listing, Subscription)> {
        let mut store = self.store.lock().unwrap();
        let now = Utc::now();

        let sub = store
            .subscriptions
            .get(subscription_id)
            .ok_or(MarketError::NoSubscription)?
            .clone();
        if !sub.is_active_at(now) {
            return Err(MarketError::NoSubscription);
        }
        let plan = store
            .plans
            .get(&sub.plan_id)
            .ok_or_else(|| MarketError::not_found("Plan not found"))?
            .clone();
        if !sub.has_quota(&plan) {
            return Err(Store::quota_error(&plan, &sub));
        }

        let id = Uuid::new_v4().to_string();
        let mut listing = Listing {
            id: id.clone(),
            user_id: create_listing.user_id.clone(),
            category_id: create_listing.category_id,
            title: create_listing.title,
            description: create_listing.description,
            price: create_listing.price,
            location: create_listing.location,
            status: ListingStatus::Pending,
            is_featured: featured,
            expiration_date: None,
            views: 0,
            created_at: now,
            updated_at: now,
        };
        listing.status = ListingStatus::Active;
        listing.expiration_date = expiration_date;
        store.listings.insert(id, listing.clone());

        let updated_sub = store.consume_quota(subscription_id)?;

        if let Some(user) = store.users.get_mut(&create_listing.user_id) {
            if !user.is_seller {
                user.is_seller = true;
                user.updated_at = now;
            }
        }

        Ok((listing, updated_sub))
    }

    async fn get_listing(&self, id: &str) -> MarketResult<Option<Listing>> {
        let store = self.store.lock().unwrap();
        Ok(store.listings.get(id).cloned())
    }

    async fn update_listing_status(
        &self,
        id: &str,
        status: ListingStatus,
    ) -> MarketResult<Listing> {
        let mut store = self.store.lock().unwrap();
        let listing = store
            .listings
            .get_mut(id)
            .ok_or_else(|| MarketError::not_found("Listing not found"))?;
        listing.status = status;
        listing.updated_at = Utc::now();
        Ok(listing.clone())
    }

    async fn delete_listing(&self, id: &str) -> MarketResult<()> {
        let mut store = self.store.lock().unwrap();
        store.listings.remove(id);
        Ok(())
    }

    async fn list_user_listings(&self, user_id: &str) -> MarketResult<Vec<Listing>> {
        let store = self.store.lock().unwrap();
        let mut listings: Vec<Listing> = store
            .listings
            .values()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listings)
    }

    async fn create_payment(&self, create_payment: CreatePayment) -> MarketResult<Payment> {
        let mut store = self.store.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        if store
            .payments
            .values()
            .any(|p| p.reference == create_payment.reference)
        {
            return Err(MarketError::conflict("Payment reference already exists"));
        }

        let payment = Payment {
            id: id.clone(),
            user_id: create_payment.user_id,
            plan_id: create_payment.plan_id,
            listing_id: create_payment.listing_id,
            amount: create_payment.amount,
            method: create_payment.method,
            status: PaymentStatus::Pending,
            reference: create_payment.reference,
            transaction_id: None,
            failure_reason: None,
            created_at: now,
            confirmed_at: None,
        };
        store.payments.insert(id, payment.clone());
        Ok(payment)
    }

    async fn get_payment(&self, id: &str) -> MarketResult<Option<Payment>> {
        let store = self.store.lock().unwrap();
        Ok(store.payments.get(id).cloned())
    }

    async fn get_payment_by_reference(&self, reference: &str) -> MarketResult<Option<Payment>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .payments
            .values()
            .find(|p| p.reference == reference)
            .cloned())
    }

    async fn mark_payment_successful(
        &self,
        id: &str,
        transaction_id: &str,
        confirmed_at: DateTime<Utc>,
    ) -> MarketResult<Payment> {
        let mut store = self.store.lock().unwrap();
        let payment = store
            .payments
            .get_mut(id)
            .ok_or_else(|| MarketError::not_found("Payment not found"))?;
        payment.status = PaymentStatus::Successful;
        payment.transaction_id = Some(transaction_id.to_string());
        payment.confirmed_at = Some(confirmed_at);
        Ok(payment.clone())
    }

    async fn mark_payment_failed(&self, id: &str, reason: &str) -> MarketResult<Payment> {
        let mut store = self.store.lock().unwrap();
        let payment = store
            .payments
            .get_mut(id)
            .ok_or_else(|| MarketError::not_found("Payment not found"))?;
        payment.status = PaymentStatus::Failed;
        payment.failure_reason = Some(reason.to_string());
        Ok(payment.clone())
    }

    async fn list_user_payments(&self, user_id: &str) -> MarketResult<Vec<Payment>> {
        let store = self.store.lock().unwrap();
        let mut payments: Vec<Payment> = store
            .payments
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CategoryScope;
    use rust_decimal_macros::dec;

    fn plan_payload(price: rust_decimal::Decimal, max_listings: i32) -> CreatePlan {
        CreatePlan {
            name: "Test Plan".to_string(),
            description: "Test".to_string(),
            price,
            duration_days: 30,
            category_scope: CategoryScope::All,
            max_listings,
            max_images_per_listing: 5,
            is_featured: false,
            is_active: true,
        }
    }

    async fn seed(db: &MemoryDatabaseAdapter, max_listings: i32) -> (User, Plan, Subscription) {
        let user = db
            .create_user(CreateUser::new("a@b.c", "A").verified(true))
            .await
            .unwrap();
        let plan = db.create_plan(plan_payload(dec!(0), max_listings)).await.unwrap();
        let sub = db
            .create_subscription(CreateSubscription {
                user_id: user.id.clone(),
                plan_id: plan.id.clone(),
                starts_at: Utc::now(),
                expires_at: None,
                auto_renew: false,
            })
            .await
            .unwrap();
        (user, plan, sub)
    }

    #[tokio::test]
    async fn consume_quota_increments_until_exhausted() {
        let db = MemoryDatabaseAdapter::new();
        let (_, _, sub) = seed(&db, 2).await;

        let s1 = db.consume_quota(&sub.id).await.unwrap();
        assert_eq!(s1.listings_used, 1);
        let s2 = db.consume_quota(&sub.id).await.unwrap();
        assert_eq!(s2.listings_used, 2);

        let err = db.consume_quota(&sub.id).await.unwrap_err();
        assert!(matches!(err, MarketError::QuotaExceeded { .. }));
    }

    #[tokio::test]
    async fn release_quota_floors_at_zero() {
        let db = MemoryDatabaseAdapter::new();
        let (_, _, sub) = seed(&db, 2).await;

        let released = db.release_quota(&sub.id).await.unwrap();
        assert_eq!(released.listings_used, 0);
    }

    #[tokio::test]
    async fn active_subscription_ignores_time_expired_rows() {
        let db = MemoryDatabaseAdapter::new();
        let user = db
            .create_user(CreateUser::new("x@y.z", "X").verified(true))
            .await
            .unwrap();
        let plan = db.create_plan(plan_payload(dec!(10), 1)).await.unwrap();
        db.create_subscription(CreateSubscription {
            user_id: user.id.clone(),
            plan_id: plan.id.clone(),
            starts_at: Utc::now() - chrono::Duration::days(60),
            expires_at: Some(Utc::now() - chrono::Duration::days(30)),
            auto_renew: false,
        })
        .await
        .unwrap();

        assert!(db.get_active_subscription(&user.id).await.unwrap().is_none());

        // The stored status was not rewritten by the read.
        let stored: Vec<Subscription> = {
            let store = db.store.lock().unwrap();
            store.subscriptions.values().cloned().collect()
        };
        assert_eq!(stored[0].status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn create_active_listing_flips_seller_flag_once() {
        let db = MemoryDatabaseAdapter::new();
        let (user, _, sub) = seed(&db, 2).await;

        let payload = CreateListing {
            user_id: user.id.clone(),
            category_id: "cat".to_string(),
            title: "House".to_string(),
            description: "Nice".to_string(),
            price: dec!(100),
            location: "Town".to_string(),
        };
        let (listing, updated) = db
            .create_active_listing(payload.clone(), &sub.id, None, false)
            .await
            .unwrap();
        assert_eq!(listing.status, ListingStatus::Active);
        assert_eq!(updated.listings_used, 1);
        assert!(db.get_user(&user.id).await.unwrap().unwrap().is_seller);

        let (_, updated) = db
            .create_active_listing(payload, &sub.id, None, false)
            .await
            .unwrap();
        assert_eq!(updated.listings_used, 2);
        assert!(db.get_user(&user.id).await.unwrap().unwrap().is_seller);
    }

    #[tokio::test]
    async fn reconcile_with_full_quota_leaves_renewal_unapplied() {
        let db = MemoryDatabaseAdapter::new();
        let user = db
            .create_user(CreateUser::new("x@y.z", "X").verified(true))
            .await
            .unwrap();
        let plan = db.create_plan(plan_payload(dec!(10), 1)).await.unwrap();
        let expires_at = Utc::now() + chrono::Duration::days(30);
        let sub = db
            .create_subscription(CreateSubscription {
                user_id: user.id.clone(),
                plan_id: plan.id.clone(),
                starts_at: Utc::now(),
                expires_at: Some(expires_at),
                auto_renew: false,
            })
            .await
            .unwrap();
        let (listing, _) = db
            .create_active_listing(
                CreateListing {
                    user_id: user.id.clone(),
                    category_id: "cat".to_string(),
                    title: "House".to_string(),
                    description: "Nice".to_string(),
                    price: dec!(100),
                    location: "Town".to_string(),
                },
                &sub.id,
                None,
                false,
            )
            .await
            .unwrap();

        // Subscription is full; naming a target must fail without touching
        // the ledger.
        let err = db
            .reconcile_plan_purchase(&user.id, &plan, Some(&listing.id))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::QuotaExceeded { .. }));

        let stored = db.get_subscription(&sub.id).await.unwrap().unwrap();
        assert_eq!(stored.expires_at, Some(expires_at));
        assert_eq!(stored.listings_used, 1);
        let stored = db.get_listing(&listing.id).await.unwrap().unwrap();
        assert_eq!(stored.expiration_date, None);
    }

    #[tokio::test]
    async fn reconcile_with_zero_slot_plan_leaves_switch_unapplied() {
        let db = MemoryDatabaseAdapter::new();
        let (user, _, old_sub) = seed(&db, 1).await;
        let (listing, _) = db
            .create_active_listing(
                CreateListing {
                    user_id: user.id.clone(),
                    category_id: "cat".to_string(),
                    title: "House".to_string(),
                    description: "Nice".to_string(),
                    price: dec!(100),
                    location: "Town".to_string(),
                },
                &old_sub.id,
                None,
                false,
            )
            .await
            .unwrap();
        let no_slots = db.create_plan(plan_payload(dec!(20), 0)).await.unwrap();

        let err = db
            .reconcile_plan_purchase(&user.id, &no_slots, Some(&listing.id))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::QuotaExceeded { .. }));

        // The old subscription was not cancelled and no new row appeared.
        let stored = db.get_subscription(&old_sub.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Active);
        assert_eq!(
            db.get_active_subscription(&user.id)
                .await
                .unwrap()
                .unwrap()
                .id,
            old_sub.id
        );
    }

    #[tokio::test]
    async fn duplicate_payment_reference_conflicts() {
        let db = MemoryDatabaseAdapter::new();
        let (user, plan, _) = seed(&db, 1).await;

        let payload = CreatePayment {
            user_id: user.id.clone(),
            plan_id: plan.id.clone(),
            listing_id: None,
            amount: dec!(10),
            method: crate::types::PaymentMethod::Card,
            reference: "SOKO-SAME".to_string(),
        };
        db.create_payment(payload.clone()).await.unwrap();
        let err = db.create_payment(payload).await.unwrap_err();
        assert!(matches!(err, MarketError::Conflict(_)));
    }
}
