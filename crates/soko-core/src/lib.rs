//! # Soko Core
//!
//! Core abstractions for the soko marketplace engine: domain types, error
//! taxonomy, configuration, and storage/collaborator adapters.

pub mod adapters;
pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used items
pub use adapters::{
    DatabaseAdapter, ImageStorageAdapter, MemoryDatabaseAdapter, MemoryImageStorage,
    MemoryNotificationAdapter, NotificationAdapter,
};
pub use config::{DefaultPlanConfig, MarketConfig};
pub use error::{DatabaseError, MarketError, MarketResult};
pub use types::{
    CategoryScope, CreateListing, CreateListingRequest, CreatePayment, CreatePlan,
    CreateSubscription, CreateUser, ImageRef, ImageUpload, InitiatePaymentRequest, Listing,
    ListingStatus, NotificationKind, Payment, PaymentMethod, PaymentStatus, Plan, Subscription,
    SubscriptionStatus, User,
};

#[cfg(feature = "sqlx-postgres")]
pub use adapters::{PoolConfig, SqlxAdapter};
