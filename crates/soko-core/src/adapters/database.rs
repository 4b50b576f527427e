use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::MarketResult;
use crate::types::{
    CreateListing, CreatePayment, CreatePlan, CreateSubscription, CreateUser, Listing,
    ListingStatus, Payment, Plan, Subscription, User,
};

/// Database adapter trait for persistence.
///
/// Besides plain CRUD, the trait exposes three compound operations —
/// [`consume_quota`](DatabaseAdapter::consume_quota),
/// [`create_active_listing`](DatabaseAdapter::create_active_listing) and
/// [`reconcile_plan_purchase`](DatabaseAdapter::reconcile_plan_purchase) —
/// which implementations must execute atomically: one storage transaction
/// with the subscription row locked (or an equivalent serialized critical
/// section). These are the points where two concurrent listing creations
/// could otherwise both pass a quota check against stale counts.
#[async_trait]
pub trait DatabaseAdapter: Send + Sync + 'static {
    // User operations
    async fn create_user(&self, user: CreateUser) -> MarketResult<User>;
    async fn get_user(&self, id: &str) -> MarketResult<Option<User>>;
    async fn set_user_verified(&self, id: &str, verified: bool) -> MarketResult<User>;

    // Plan operations
    async fn create_plan(&self, plan: CreatePlan) -> MarketResult<Plan>;
    async fn get_plan(&self, id: &str) -> MarketResult<Option<Plan>>;
    async fn list_active_plans(&self) -> MarketResult<Vec<Plan>>;
    /// The active zero-price plan, if one exists.
    async fn find_free_plan(&self) -> MarketResult<Option<Plan>>;

    // Subscription operations
    async fn create_subscription(&self, sub: CreateSubscription) -> MarketResult<Subscription>;
    async fn get_subscription(&self, id: &str) -> MarketResult<Option<Subscription>>;
    /// The subscription with `status = active` that has not time-expired.
    /// Reads never rewrite a stale `active` status in storage.
    async fn get_active_subscription(&self, user_id: &str) -> MarketResult<Option<Subscription>>;
    /// Atomically re-check remaining quota and increment `listings_used`.
    /// Fails with `QuotaExceeded` when no quota remains at commit time.
    async fn consume_quota(&self, subscription_id: &str) -> MarketResult<Subscription>;
    /// Decrement `listings_used`, floored at zero.
    async fn release_quota(&self, subscription_id: &str) -> MarketResult<Subscription>;
    /// Apply a confirmed plan purchase: renew the matching active
    /// subscription, or cancel all other active subscriptions and create a
    /// fresh one, then activate the target listing (featured grant, new
    /// expiry, quota consumption) if one was named. Single atomic unit.
    async fn reconcile_plan_purchase(
        &self,
        user_id: &str,
        plan: &Plan,
        target_listing_id: Option<&str>,
    ) -> MarketResult<Subscription>;

    // Listing operations
    /// Create a listing and activate it against the given subscription:
    /// insert pending, promote to active with the given expiration, consume
    /// one quota unit and flip the owner's seller flag — atomically.
    async fn create_active_listing(
        &self,
        listing: CreateListing,
        subscription_id: &str,
        expiration_date: Option<DateTime<Utc>>,
        featured: bool,
    ) -> MarketResult<(Listing, Subscription)>;
    async fn get_listing(&self, id: &str) -> MarketResult<Option<Listing>>;
    async fn update_listing_status(
        &self,
        id: &str,
        status: ListingStatus,
    ) -> MarketResult<Listing>;
    async fn delete_listing(&self, id: &str) -> MarketResult<()>;
    async fn list_user_listings(&self, user_id: &str) -> MarketResult<Vec<Listing>>;

    // Payment operations
    async fn create_payment(&self, payment: CreatePayment) -> MarketResult<Payment>;
    async fn get_payment(&self, id: &str) -> MarketResult<Option<Payment>>;
    async fn get_payment_by_reference(&self, reference: &str) -> MarketResult<Option<Payment>>;
    async fn mark_payment_successful(
        &self,
        id: &str,
        transaction_id: &str,
        confirmed_at: DateTime<Utc>,
    ) -> MarketResult<Payment>;
    async fn mark_payment_failed(&self, id: &str, reason: &str) -> MarketResult<Payment>;
    async fn list_user_payments(&self, user_id: &str) -> MarketResult<Vec<Payment>>;
}

#[cfg(feature = "sqlx-postgres")]
pub mod sqlx_adapter {
    use super::*;
    use crate::error::MarketError;
    use sqlx::PgPool;
    use uuid::Uuid;

    /// Table schema applied by [`SqlxAdapter::migrate`].
    ///
    /// Note: the single-active-subscription invariant is enforced
    /// procedurally by `reconcile_plan_purchase`; a partial unique index
    /// (`ON subscriptions (user_id) WHERE status = 'active'`) would close
    /// the remaining gap and can be added without code changes.
    const SCHEMA: &str = r#"
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL UNIQUE,
            name        TEXT NOT NULL,
            is_verified BOOLEAN NOT NULL DEFAULT FALSE,
            is_seller   BOOLEAN NOT NULL DEFAULT FALSE,
            is_admin    BOOLEAN NOT NULL DEFAULT FALSE,
            created_at  TIMESTAMPTZ NOT NULL,
            updated_at  TIMESTAMPTZ NOT NULL
        );
        CREATE TABLE IF NOT EXISTS plans (
            id                     TEXT PRIMARY KEY,
            name                   TEXT NOT NULL,
            description            TEXT NOT NULL,
            price                  NUMERIC(12, 2) NOT NULL,
            duration_days          INTEGER NOT NULL,
            category_scope         TEXT NOT NULL,
            max_listings           INTEGER NOT NULL,
            max_images_per_listing INTEGER NOT NULL,
            is_featured            BOOLEAN NOT NULL DEFAULT FALSE,
            is_active              BOOLEAN NOT NULL DEFAULT TRUE,
            created_at             TIMESTAMPTZ NOT NULL,
            updated_at             TIMESTAMPTZ NOT NULL
        );
        CREATE TABLE IF NOT EXISTS subscriptions (
            id            TEXT PRIMARY KEY,
            user_id       TEXT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
            plan_id       TEXT NOT NULL REFERENCES plans (id),
            status        TEXT NOT NULL,
            listings_used INTEGER NOT NULL DEFAULT 0 CHECK (listings_used >= 0),
            starts_at     TIMESTAMPTZ NOT NULL,
            expires_at    TIMESTAMPTZ,
            auto_renew    BOOLEAN NOT NULL DEFAULT FALSE,
            created_at    TIMESTAMPTZ NOT NULL,
            updated_at    TIMESTAMPTZ NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_subscriptions_user_status
            ON subscriptions (user_id, status);
        CREATE TABLE IF NOT EXISTS listings (
            id              TEXT PRIMARY KEY,
            user_id         TEXT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
            category_id     TEXT NOT NULL,
            title           TEXT NOT NULL,
            description     TEXT NOT NULL,
            price           NUMERIC(15, 2) NOT NULL,
            location        TEXT NOT NULL,
            status          TEXT NOT NULL,
            is_featured     BOOLEAN NOT NULL DEFAULT FALSE,
            expiration_date TIMESTAMPTZ,
            views           BIGINT NOT NULL DEFAULT 0,
            created_at      TIMESTAMPTZ NOT NULL,
            updated_at      TIMESTAMPTZ NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_listings_user ON listings (user_id);
        CREATE INDEX IF NOT EXISTS idx_listings_status ON listings (status);
        CREATE TABLE IF NOT EXISTS payments (
            id             TEXT PRIMARY KEY,
            user_id        TEXT NOT NULL REFERENCES users (id),
            plan_id        TEXT NOT NULL REFERENCES plans (id),
            listing_id     TEXT REFERENCES listings (id) ON DELETE SET NULL,
            amount         NUMERIC(12, 2) NOT NULL,
            method         TEXT NOT NULL,
            status         TEXT NOT NULL,
            reference      TEXT NOT NULL UNIQUE,
            transaction_id TEXT,
            failure_reason TEXT,
            created_at     TIMESTAMPTZ NOT NULL,
            confirmed_at   TIMESTAMPTZ
        );
        CREATE INDEX IF NOT EXISTS idx_payments_user ON payments (user_id);
        CREATE INDEX IF NOT EXISTS idx_payments_status ON payments (status);
    "#;

    /// PostgreSQL database adapter via SQLx.
    pub struct SqlxAdapter {
        pool: PgPool,
    }

    impl SqlxAdapter {
        pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
            let pool = PgPool::connect(database_url).await?;
            Ok(Self { pool })
        }

        /// Create adapter with custom pool configuration
        pub async fn with_config(
            database_url: &str,
            config: PoolConfig,
        ) -> Result<Self, sqlx::Error> {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .acquire_timeout(config.acquire_timeout)
                .idle_timeout(config.idle_timeout)
                .max_lifetime(config.max_lifetime)
                .connect(database_url)
                .await?;
            Ok(Self { pool })
        }

        pub fn from_pool(pool: PgPool) -> Self {
            Self { pool }
        }

        /// Apply the engine schema. Idempotent.
        pub async fn migrate(&self) -> Result<(), sqlx::Error> {
            let mut tx = self.pool.begin().await?;
            for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
                sqlx::query(statement).execute(&mut *tx).await?;
            }
            tx.commit().await?;
            Ok(())
        }

        /// Test database connection
        pub async fn test_connection(&self) -> Result<(), sqlx::Error> {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok(())
        }

        /// Close the connection pool
        pub async fn close(&self) {
            self.pool.close().await;
        }
    }

    /// Database connection pool configuration
    #[derive(Debug, Clone)]
    pub struct PoolConfig {
        pub max_connections: u32,
        pub min_connections: u32,
        pub acquire_timeout: std::time::Duration,
        pub idle_timeout: Option<std::time::Duration>,
        pub max_lifetime: Option<std::time::Duration>,
    }

    impl Default for PoolConfig {
        fn default() -> Self {
            Self {
                max_connections: 10,
                min_connections: 0,
                acquire_timeout: std::time::Duration::from_secs(30),
                idle_timeout: Some(std::time::Duration::from_secs(600)),
                max_lifetime: Some(std::time::Duration::from_secs(1800)),
            }
        }
    }

    #[async_trait]
    impl DatabaseAdapter for SqlxAdapter {
        async fn create_user(&self, create_user: CreateUser) -> MarketResult<User> {
            let id = create_user.id.unwrap_or_else(|| Uuid::new_v4().to_string());
            let now = Utc::now();

            let user = sqlx::query_as::<_, User>(
                r#"
                INSERT INTO users (id, email, name, is_verified, is_seller, is_admin, created_at, updated_at)
                VALUES ($1, $2, $3, $4, FALSE, $5, $6, $7)
                RETURNING *
                "#,
            )
            .bind(&id)
            .bind(&create_user.email)
            .bind(&create_user.name)
            .bind(create_user.is_verified)
            .bind(create_user.is_admin)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

            Ok(user)
        }

        async fn get_user(&self, id: &str) -> MarketResult<Option<User>> {
            let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

            Ok(user)
        }

        async fn set_user_verified(&self, id: &str, verified: bool) -> MarketResult<User> {
            let user = sqlx::query_as::<_, User>(
                "UPDATE users SET is_verified = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
            )
            .bind(verified)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

            user.ok_or_else(|| MarketError::not_found("User not found"))
        }

        async fn create_plan(&self, create_plan: CreatePlan) -> MarketResult<Plan> {
            let id = Uuid::new_v4().to_string();
            let now = Utc::now();

            let plan = sqlx::query_as::<_, Plan>(
                r#"
                INSERT INTO plans (id, name, description, price, duration_days, category_scope,
                                   max_listings, max_images_per_listing, is_featured, is_active,
                                   created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                RETURNING *
                "#,
            )
            .bind(&id)
            .bind(&create_plan.name)
            .bind(&create_plan.description)
            .bind(create_plan.price)
            .bind(create_plan.duration_days)
            .bind(create_plan.category_scope)
            .bind(create_plan.max_listings)
            .bind(create_plan.max_images_per_listing)
            .bind(create_plan.is_featured)
            .bind(create_plan.is_active)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

            Ok(plan)
        }

        async fn get_plan(&self, id: &str) -> MarketResult<Option<Plan>> {
            let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

            Ok(plan)
        }

        async fn list_active_plans(&self) -> MarketResult<Vec<Plan>> {
            let plans = sqlx::query_as::<_, Plan>(
                "SELECT * FROM plans WHERE is_active = TRUE ORDER BY price ASC",
            )
            .fetch_all(&self.pool)
            .await?;

            Ok(plans)
        }

        async fn find_free_plan(&self) -> MarketResult<Option<Plan>> {
            let plan = sqlx::query_as::<_, Plan>(
                "SELECT * FROM plans WHERE price = 0 AND is_active = TRUE ORDER BY created_at ASC LIMIT 1",
            )
            .fetch_optional(&self.pool)
            .await?;

            Ok(plan)
        }

        async fn create_subscription(
            &self,
            create_sub: CreateSubscription,
        ) -> MarketResult<Subscription> {
            let id = Uuid::new_v4().to_string();
            let now = Utc::now();

            let subscription = sqlx::query_as::<_, Subscription>(
                r#"
                INSERT INTO subscriptions (id, user_id, plan_id, status, listings_used,
                                           starts_at, expires_at, auto_renew, created_at, updated_at)
                VALUES ($1, $2, $3, 'active', 0, $4, $5, $6, $7, $8)
                RETURNING *
                "#,
            )
            .bind(&id)
            .bind(&create_sub.user_id)
            .bind(&create_sub.plan_id)
            .bind(create_sub.starts_at)
            .bind(create_sub.expires_at)
            .bind(create_sub.auto_renew)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

            Ok(subscription)
        }

        async fn get_subscription(&self, id: &str) -> MarketResult<Option<Subscription>> {
            let subscription =
                sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?;

            Ok(subscription)
        }

        async fn get_active_subscription(
            &self,
            user_id: &str,
        ) -> MarketResult<Option<Subscription>> {
            let subscription = sqlx::query_as::<_, Subscription>(
                r#"
                SELECT * FROM subscriptions
                WHERE user_id = $1 AND status = 'active'
                  AND (expires_at IS NULL OR expires_at > NOW())
                ORDER BY created_at DESC
                LIMIT 1
                "#,
            )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

            Ok(subscription)
        }

        async fn consume_quota(&self, subscription_id: &str) -> MarketResult<Subscription> {
            let mut tx = self.pool.begin().await?;

            let sub = sqlx::query_as::<_, Subscription>(
                "SELECT * FROM subscriptions WHERE id = $1 FOR UPDATE",
            )
            .bind(subscription_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| MarketError::not_found("Subscription not found"))?;

            let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
                .bind(&sub.plan_id)
                .fetch_one(&mut *tx)
                .await?;

            if !sub.has_quota(&plan) {
                // Dropping the transaction rolls back the row lock.
                return Err(MarketError::QuotaExceeded {
                    plan: plan.name,
                    max_listings: plan.max_listings,
                    used: sub.listings_used,
                });
            }

            let updated = sqlx::query_as::<_, Subscription>(
                r#"
                UPDATE subscriptions
                SET listings_used = listings_used + 1, updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(subscription_id)
            .fetch_one(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(updated)
        }

        async fn release_quota(&self, subscription_id: &str) -> MarketResult<Subscription> {
            let updated = sqlx::query_as::<_, Subscription>(
                r#"
                UPDATE subscriptions
                SET listings_used = GREATEST(listings_used - 1, 0), updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(subscription_id)
            .fetch_optional(&self.pool)
            .await?;

            updated.ok_or_else(|| MarketError::not_found("Subscription not found"))
        }

        async fn reconcile_plan_purchase(
            &self,
            user_id: &str,
            plan: &Plan,
            target_listing_id: Option<&str>,
        ) -> MarketResult<Subscription> {
            let now = Utc::now();
            let mut tx = self.pool.begin().await?;

            let existing = sqlx::query_as::<_, Subscription>(
                r#"
                SELECT * FROM subscriptions
                WHERE user_id = $1 AND plan_id = $2 AND status = 'active'
                ORDER BY created_at DESC
                LIMIT 1
                FOR UPDATE
                "#,
            )
            .bind(user_id)
            .bind(&plan.id)
            .fetch_optional(&mut *tx)
            .await?;

            let mut subscription = match existing {
                // Renewal: stack on remaining time, or restart from now.
                Some(sub) => match sub.expires_at {
                    Some(expires_at) if expires_at > now => {
                        sqlx::query_as::<_, Subscription>(
                            r#"
                            UPDATE subscriptions
                            SET expires_at = $1, updated_at = NOW()
                            WHERE id = $2
                            RETURNING *
                            "#,
                        )
                        .bind(expires_at + chrono::Duration::days(plan.duration_days as i64))
                        .bind(&sub.id)
                        .fetch_one(&mut *tx)
                        .await?
                    }
                    _ => {
                        sqlx::query_as::<_, Subscription>(
                            r#"
                            UPDATE subscriptions
                            SET starts_at = $1, expires_at = $2, updated_at = NOW()
                            WHERE id = $3
                            RETURNING *
                            "#,
                        )
                        .bind(now)
                        .bind(plan.expiry_from(now))
                        .bind(&sub.id)
                        .fetch_one(&mut *tx)
                        .await?
                    }
                },
                // Switch: cancel everything else, then start fresh.
                None => {
                    sqlx::query(
                        r#"
                        UPDATE subscriptions
                        SET status = 'cancelled', expires_at = $1, updated_at = NOW()
                        WHERE user_id = $2 AND status = 'active' AND plan_id <> $3
                        "#,
                    )
                    .bind(now)
                    .bind(user_id)
                    .bind(&plan.id)
                    .execute(&mut *tx)
                    .await?;

                    let id = Uuid::new_v4().to_string();
                    sqlx::query_as::<_, Subscription>(
                        r#"
                        INSERT INTO subscriptions (id, user_id, plan_id, status, listings_used,
                                                   starts_at, expires_at, auto_renew, created_at, updated_at)
                        VALUES ($1, $2, $3, 'active', 0, $4, $5, FALSE, $6, $7)
                        RETURNING *
                        "#,
                    )
                    .bind(&id)
                    .bind(user_id)
                    .bind(&plan.id)
                    .bind(now)
                    .bind(plan.expiry_from(now))
                    .bind(now)
                    .bind(now)
                    .fetch_one(&mut *tx)
                    .await?
                }
            };

            if let Some(listing_id) = target_listing_id {
                let listing = sqlx::query_as::<_, Listing>(
                    "SELECT * FROM listings WHERE id = $1 FOR UPDATE",
                )
                .bind(listing_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| MarketError::not_found("Listing not found"))?;

                if !subscription.has_quota(plan) {
                    return Err(MarketError::QuotaExceeded {
                        plan: plan.name.clone(),
                        max_listings: plan.max_listings,
                        used: subscription.listings_used,
                    });
                }

                // Featured is granted, never revoked, by this path.
                sqlx::query(
                    r#"
                    UPDATE listings
                    SET status = 'active',
                        is_featured = is_featured OR $1,
                        expiration_date = $2,
                        updated_at = NOW()
                    WHERE id = $3
                    "#,
                )
                .bind(plan.is_featured)
                .bind(subscription.expires_at)
                .bind(&listing.id)
                .execute(&mut *tx)
                .await?;

                subscription = sqlx::query_as::<_, Subscription>(
                    r#"
                    UPDATE subscriptions
                    SET listings_used = listings_used + 1, updated_at = NOW()
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(&subscription.id)
                .fetch_one(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok(subscription)
        }

        async fn create_active_listing(
            &self,
            create_listing: CreateListing,
            subscription_id: &str,
            expiration_date: Option<DateTime<Utc>>,
            featured: bool,
        ) -> MarketResult<(Listing, Subscription)> {
            let now = Utc::now();
            let mut tx = self.pool.begin().await?;

            let sub = sqlx::query_as::<_, Subscription>(
                "SELECT * FROM subscriptions WHERE id = $1 FOR UPDATE",
            )
            .bind(subscription_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(MarketError::NoSubscription)?;

            if !sub.is_active_at(now) {
                return Err(MarketError::NoSubscription);
            }

            let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
                .bind(&sub.plan_id)
                .fetch_one(&mut *tx)
                .await?;

            if !sub.has_quota(&plan) {
                return Err(MarketError::QuotaExceeded {
                    plan: plan.name,
                    max_listings: plan.max_listings,
                    used: sub.listings_used,
                });
            }

            let id = Uuid::new_v4().to_string();
            sqlx::query(
                r#"
                INSERT INTO listings (id, user_id, category_id, title, description, price,
                                      location, status, is_featured, expiration_date, views,
                                      created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, NULL, 0, $9, $10)
                "#,
            )
            .bind(&id)
            .bind(&create_listing.user_id)
            .bind(&create_listing.category_id)
            .bind(&create_listing.title)
            .bind(&create_listing.description)
            .bind(create_listing.price)
            .bind(&create_listing.location)
            .bind(featured)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            let listing = sqlx::query_as::<_, Listing>(
                r#"
                UPDATE listings
                SET status = 'active', expiration_date = $1, updated_at = NOW()
                WHERE id = $2
                RETURNING *
                "#,
            )
            .bind(expiration_date)
            .bind(&id)
            .fetch_one(&mut *tx)
            .await?;

            let updated_sub = sqlx::query_as::<_, Subscription>(
                r#"
                UPDATE subscriptions
                SET listings_used = listings_used + 1, updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(subscription_id)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                "UPDATE users SET is_seller = TRUE, updated_at = NOW() WHERE id = $1 AND is_seller = FALSE",
            )
            .bind(&create_listing.user_id)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok((listing, updated_sub))
        }

        async fn get_listing(&self, id: &str) -> MarketResult<Option<Listing>> {
            let listing = sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

            Ok(listing)
        }

        async fn update_listing_status(
            &self,
            id: &str,
            status: ListingStatus,
        ) -> MarketResult<Listing> {
            let listing = sqlx::query_as::<_, Listing>(
                "UPDATE listings SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
            )
            .bind(status)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

            listing.ok_or_else(|| MarketError::not_found("Listing not found"))
        }

        async fn delete_listing(&self, id: &str) -> MarketResult<()> {
            sqlx::query("DELETE FROM listings WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;

            Ok(())
        }

        async fn list_user_listings(&self, user_id: &str) -> MarketResult<Vec<Listing>> {
            let listings = sqlx::query_as::<_, Listing>(
                "SELECT * FROM listings WHERE user_id = $1 ORDER BY created_at DESC",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

            Ok(listings)
        }

        async fn create_payment(&self, create_payment: CreatePayment) -> MarketResult<Payment> {
            let id = Uuid::new_v4().to_string();
            let now = Utc::now();

            let payment = sqlx::query_as::<_, Payment>(
                r#"
                INSERT INTO payments (id, user_id, plan_id, listing_id, amount, method, status,
                                      reference, transaction_id, failure_reason, created_at, confirmed_at)
                VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, NULL, NULL, $8, NULL)
                RETURNING *
                "#,
            )
            .bind(&id)
            .bind(&create_payment.user_id)
            .bind(&create_payment.plan_id)
            .bind(&create_payment.listing_id)
            .bind(create_payment.amount)
            .bind(create_payment.method)
            .bind(&create_payment.reference)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

            Ok(payment)
        }

        async fn get_payment(&self, id: &str) -> MarketResult<Option<Payment>> {
            let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

            Ok(payment)
        }

        async fn get_payment_by_reference(&self, reference: &str) -> MarketResult<Option<Payment>> {
            let payment =
                sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE reference = $1")
                    .bind(reference)
                    .fetch_optional(&self.pool)
                    .await?;

            Ok(payment)
        }

        async fn mark_payment_successful(
            &self,
            id: &str,
            transaction_id: &str,
            confirmed_at: DateTime<Utc>,
        ) -> MarketResult<Payment> {
            let payment = sqlx::query_as::<_, Payment>(
                r#"
                UPDATE payments
                SET status = 'successful', transaction_id = $1, confirmed_at = $2
                WHERE id = $3
                RETURNING *
                "#,
            )
            .bind(transaction_id)
            .bind(confirmed_at)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

            payment.ok_or_else(|| MarketError::not_found("Payment not found"))
        }

        async fn mark_payment_failed(&self, id: &str, reason: &str) -> MarketResult<Payment> {
            let payment = sqlx::query_as::<_, Payment>(
                r#"
                UPDATE payments
                SET status = 'failed', failure_reason = $1
                WHERE id = $2
                RETURNING *
                "#,
            )
            .bind(reason)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

            payment.ok_or_else(|| MarketError::not_found("Payment not found"))
        }

        async fn list_user_payments(&self, user_id: &str) -> MarketResult<Vec<Payment>> {
            let payments = sqlx::query_as::<_, Payment>(
                "SELECT * FROM payments WHERE user_id = $1 ORDER BY created_at DESC",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

            Ok(payments)
        }
    }
}

#[cfg(feature = "sqlx-postgres")]
pub use sqlx_adapter::{PoolConfig, SqlxAdapter};
