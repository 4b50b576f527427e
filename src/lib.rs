//! # Soko
//!
//! Subscription, quota and listing-activation engine for a classifieds
//! marketplace. This facade re-exports the core abstractions (`soko-core`)
//! and the assembled engine (`soko-api`).
//!
//! ```no_run
//! use soko::{MarketConfig, Marketplace, MemoryDatabaseAdapter};
//!
//! # fn main() -> Result<(), soko::MarketError> {
//! let market = Marketplace::builder(MarketConfig::default())
//!     .database(MemoryDatabaseAdapter::new())
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub use soko_api::{
    ListingCreated, ListingLifecycle, MarketBuilder, Marketplace, PaymentReconciliation,
    PlanCatalog, SubscriptionLedger,
};
pub use soko_core::*;
