use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use soko_core::adapters::DatabaseAdapter;
use soko_core::{
    CategoryScope, CreateListing, CreateListingRequest, CreatePlan, CreateSubscription,
    CreateUser, Listing, ListingStatus, MarketConfig, MemoryDatabaseAdapter, MemoryImageStorage,
    MemoryNotificationAdapter, Plan, Subscription, User,
};

use crate::market::Marketplace;

/// Seeding and inspection helpers shared by the component tests.
pub(crate) struct TestHelpers {
    pub db: Arc<MemoryDatabaseAdapter>,
    pub notifier: Arc<MemoryNotificationAdapter>,
}

/// A marketplace wired to in-memory adapters, plus handles for seeding.
pub(crate) fn test_market() -> (Marketplace, TestHelpers) {
    let db = Arc::new(MemoryDatabaseAdapter::new());
    let notifier = Arc::new(MemoryNotificationAdapter::new());
    let market = Marketplace::builder(MarketConfig::default())
        .database_arc(db.clone())
        .notifications_arc(notifier.clone())
        .image_storage(MemoryImageStorage::new())
        .build()
        .unwrap();
    (market, TestHelpers { db, notifier })
}

pub(crate) fn listing_request(title: &str) -> CreateListingRequest {
    CreateListingRequest {
        category_id: "cat-vehicles".to_string(),
        title: title.to_string(),
        description: format!("{title} in good condition"),
        price: dec!(1500),
        location: "Dar es Salaam".to_string(),
        images: Vec::new(),
    }
}

impl TestHelpers {
    pub async fn seed_user(&self, email: &str, verified: bool) -> User {
        let name = email.split('@').next().unwrap_or("user").to_string();
        self.db
            .create_user(CreateUser::new(email, name).verified(verified))
            .await
            .unwrap()
    }

    pub async fn seed_admin(&self, email: &str) -> User {
        self.db
            .create_user(
                CreateUser::new(email, "admin")
                    .verified(true)
                    .admin(true),
            )
            .await
            .unwrap()
    }

    pub async fn seed_plan(
        &self,
        name: &str,
        price: Decimal,
        duration_days: i32,
        max_listings: i32,
        is_featured: bool,
        is_active: bool,
    ) -> Plan {
        self.db
            .create_plan(CreatePlan {
                name: name.to_string(),
                description: format!("{name} plan"),
                price,
                duration_days,
                category_scope: CategoryScope::All,
                max_listings,
                max_images_per_listing: 5,
                is_featured,
                is_active,
            })
            .await
            .unwrap()
    }

    pub async fn subscribe(&self, user: &User, plan: &Plan) -> Subscription {
        let now = Utc::now();
        self.db
            .create_subscription(CreateSubscription {
                user_id: user.id.clone(),
                plan_id: plan.id.clone(),
                starts_at: now,
                expires_at: plan.expiry_from(now),
                auto_renew: false,
            })
            .await
            .unwrap()
    }

    pub async fn subscribe_expiring(
        &self,
        user: &User,
        plan: &Plan,
        expires_at: DateTime<Utc>,
    ) -> Subscription {
        self.db
            .create_subscription(CreateSubscription {
                user_id: user.id.clone(),
                plan_id: plan.id.clone(),
                starts_at: expires_at - chrono::Duration::days(plan.duration_days.max(1) as i64),
                expires_at: Some(expires_at),
                auto_renew: false,
            })
            .await
            .unwrap()
    }

    /// A listing in `Hidden` status owned by `user`, without any lasting
    /// quota consumption. Subscribes the user to a throwaway plan first if
    /// they hold no active subscription.
    pub async fn seed_hidden_listing(&self, user: &User) -> Listing {
        let sub = match self.db.get_active_subscription(&user.id).await.unwrap() {
            Some(sub) => sub,
            None => {
                let plan = self.seed_plan("Seed", dec!(1), 60, 100, false, true).await;
                self.subscribe(user, &plan).await
            }
        };
        let (listing, _) = self
            .db
            .create_active_listing(
                CreateListing {
                    user_id: user.id.clone(),
                    category_id: "cat-vehicles".to_string(),
                    title: "Seeded listing".to_string(),
                    description: "Seeded for tests".to_string(),
                    price: dec!(900),
                    location: "Arusha".to_string(),
                },
                &sub.id,
                None,
                false,
            )
            .await
            .unwrap();
        let listing = self
            .db
            .update_listing_status(&listing.id, ListingStatus::Hidden)
            .await
            .unwrap();
        self.db.release_quota(&sub.id).await.unwrap();
        listing
    }

    pub async fn get_user(&self, id: &str) -> User {
        self.db.get_user(id).await.unwrap().unwrap()
    }

    pub async fn get_subscription(&self, id: &str) -> Subscription {
        self.db.get_subscription(id).await.unwrap().unwrap()
    }

    pub async fn get_listing(&self, id: &str) -> Listing {
        self.db.get_listing(id).await.unwrap().unwrap()
    }
}
