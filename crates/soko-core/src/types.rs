use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Category restriction a pricing plan applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx-postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx-postgres",
    sqlx(type_name = "text", rename_all = "snake_case")
)]
pub enum CategoryScope {
    All,
    RealEstate,
    Vehicle,
}

impl CategoryScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryScope::All => "all",
            CategoryScope::RealEstate => "real_estate",
            CategoryScope::Vehicle => "vehicle",
        }
    }
}

impl std::fmt::Display for CategoryScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pricing plan. Immutable from the engine's perspective; administrative
/// edits never retroactively affect subscriptions already pointing at it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-postgres", derive(sqlx::FromRow))]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    /// Days of validity granted per purchase. `0` means "never expires".
    #[serde(rename = "durationDays")]
    pub duration_days: i32,
    #[serde(rename = "categoryScope")]
    pub category_scope: CategoryScope,
    #[serde(rename = "maxListings")]
    pub max_listings: i32,
    #[serde(rename = "maxImagesPerListing")]
    pub max_images_per_listing: i32,
    /// Listings created or activated under this plan are flagged featured.
    #[serde(rename = "isFeatured")]
    pub is_featured: bool,
    /// Whether the plan is currently purchasable.
    #[serde(rename = "isActive")]
    pub is_active: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    /// Expiry deadline for a grant starting at `now`. `None` for
    /// non-expiring plans (`duration_days == 0`).
    pub fn expiry_from(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.duration_days == 0 {
            None
        } else {
            Some(now + Duration::days(self.duration_days as i64))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx-postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx-postgres",
    sqlx(type_name = "text", rename_all = "snake_case")
)]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's subscription to a pricing plan, carrying the quota counter.
///
/// At most one subscription per user should be in `Active` status at any
/// time; the ledger enforces this procedurally when subscriptions are
/// created or switched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-postgres", derive(sqlx::FromRow))]
pub struct Subscription {
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "planId")]
    pub plan_id: String,
    pub status: SubscriptionStatus,
    /// Number of quota units currently consumed. Never negative.
    #[serde(rename = "listingsUsed")]
    pub listings_used: i32,
    #[serde(rename = "startsAt")]
    pub starts_at: DateTime<Utc>,
    /// `None` means the subscription never expires.
    #[serde(rename = "expiresAt")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(rename = "autoRenew")]
    pub auto_renew: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Whether the subscription is active at `now`. A stored `Active` status
    /// with a past `expires_at` reads as inactive; the record itself is not
    /// rewritten by reads.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        if self.status != SubscriptionStatus::Active {
            return false;
        }
        match self.expires_at {
            Some(expires_at) => expires_at > now,
            None => true,
        }
    }

    pub fn remaining_listings(&self, plan: &Plan) -> i32 {
        (plan.max_listings - self.listings_used).max(0)
    }

    pub fn has_quota(&self, plan: &Plan) -> bool {
        self.remaining_listings(plan) > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx-postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx-postgres",
    sqlx(type_name = "text", rename_all = "snake_case")
)]
pub enum ListingStatus {
    Pending,
    Active,
    Sold,
    Expired,
    Hidden,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Pending => "pending",
            ListingStatus::Active => "active",
            ListingStatus::Sold => "sold",
            ListingStatus::Expired => "expired",
            ListingStatus::Hidden => "hidden",
        }
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-postgres", derive(sqlx::FromRow))]
pub struct Listing {
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "categoryId")]
    pub category_id: String,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub location: String,
    pub status: ListingStatus,
    #[serde(rename = "isFeatured")]
    pub is_featured: bool,
    /// Authoritative deadline after which the listing counts as expired.
    /// `None` when created under a non-expiring plan.
    #[serde(rename = "expirationDate")]
    pub expiration_date: Option<DateTime<Utc>>,
    pub views: i64,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx-postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx-postgres",
    sqlx(type_name = "text", rename_all = "snake_case")
)]
pub enum PaymentMethod {
    MobileMoney,
    Card,
    Wallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::MobileMoney => "mobile_money",
            PaymentMethod::Card => "card",
            PaymentMethod::Wallet => "wallet",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx-postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx-postgres",
    sqlx(type_name = "text", rename_all = "snake_case")
)]
pub enum PaymentStatus {
    Pending,
    Successful,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Successful => "successful",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment record. Transitions to `Successful` exactly once; re-confirming
/// an already-successful payment is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-postgres", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "planId")]
    pub plan_id: String,
    /// Optional listing the purchased plan should be applied to.
    #[serde(rename = "listingId")]
    pub listing_id: Option<String>,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Human-shareable reference code, unique across payments.
    pub reference: String,
    #[serde(rename = "transactionId")]
    pub transaction_id: Option<String>,
    #[serde(rename = "failureReason")]
    pub failure_reason: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "confirmedAt")]
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// Narrow identity shape the engine consumes. Authentication and
/// verification themselves live outside the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-postgres", derive(sqlx::FromRow))]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(rename = "isVerified")]
    pub is_verified: bool,
    #[serde(rename = "isSeller")]
    pub is_seller: bool,
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

// ─── Creation payloads (adapter-level) ──────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct CreateUser {
    pub id: Option<String>,
    pub email: String,
    pub name: String,
    pub is_verified: bool,
    pub is_admin: bool,
}

impl CreateUser {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            email: email.into(),
            name: name.into(),
            is_verified: false,
            is_admin: false,
        }
    }

    pub fn verified(mut self, verified: bool) -> Self {
        self.is_verified = verified;
        self
    }

    pub fn admin(mut self, admin: bool) -> Self {
        self.is_admin = admin;
        self
    }
}

#[derive(Debug, Clone)]
pub struct CreatePlan {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub duration_days: i32,
    pub category_scope: CategoryScope,
    pub max_listings: i32,
    pub max_images_per_listing: i32,
    pub is_featured: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct CreateSubscription {
    pub user_id: String,
    pub plan_id: String,
    pub starts_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub auto_renew: bool,
}

#[derive(Debug, Clone)]
pub struct CreateListing {
    pub user_id: String,
    pub category_id: String,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub location: String,
}

#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub user_id: String,
    pub plan_id: String,
    pub listing_id: Option<String>,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: String,
}

// ─── Request payloads (caller-facing, validated) ────────────────────────

/// An uploaded image as handed to the engine. Transcoding and storage are
/// the image adapter's concern; the engine only enforces the per-plan count
/// ceiling and basic acceptance checks.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Reference to a stored listing image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: String,
    #[serde(rename = "listingId")]
    pub listing_id: String,
    pub url: String,
    #[serde(rename = "isPrimary")]
    pub is_primary: bool,
    #[serde(rename = "displayOrder")]
    pub display_order: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateListingRequest {
    #[serde(rename = "categoryId")]
    #[validate(length(min = 1, message = "categoryId is required"))]
    pub category_id: String,
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
    pub price: Decimal,
    #[validate(length(min = 1, max = 255, message = "location must be 1-255 characters"))]
    pub location: String,
    #[serde(skip)]
    pub images: Vec<ImageUpload>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InitiatePaymentRequest {
    #[serde(rename = "planId")]
    #[validate(length(min = 1, message = "planId is required"))]
    pub plan_id: String,
    #[serde(rename = "listingId")]
    pub listing_id: Option<String>,
    pub method: PaymentMethod,
}

/// Fire-and-forget notification kinds emitted after core events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    PaymentSuccessful,
    PaymentFailed,
    ListingActivated,
    ListingStatusChanged,
    SubscriptionAssigned,
    SubscriptionUpdated,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::PaymentSuccessful => "payment_successful",
            NotificationKind::PaymentFailed => "payment_failed",
            NotificationKind::ListingActivated => "listing_activated",
            NotificationKind::ListingStatusChanged => "listing_status_changed",
            NotificationKind::SubscriptionAssigned => "subscription_assigned",
            NotificationKind::SubscriptionUpdated => "subscription_updated",
        }
    }
}
