//! Marketplace monetization engine.
//!
//! Assembles the plan catalog, subscription ledger, listing lifecycle and
//! payment reconciliation components over the adapters provided by
//! `soko-core`. Build a [`Marketplace`] with [`Marketplace::builder`] and a
//! database adapter; notifications and image storage are optional.

pub mod catalog;
pub mod ledger;
pub mod listings;
pub mod market;
pub mod payments;

pub use catalog::PlanCatalog;
pub use ledger::SubscriptionLedger;
pub use listings::{ListingCreated, ListingLifecycle};
pub use market::{MarketBuilder, Marketplace};
pub use payments::PaymentReconciliation;

#[cfg(test)]
pub(crate) mod test_helpers;
