use std::sync::Arc;

use soko_core::adapters::{DatabaseAdapter, ImageStorageAdapter, NotificationAdapter};
use soko_core::{MarketConfig, MarketError, MarketResult, NotificationKind, Subscription};

use crate::catalog::PlanCatalog;
use crate::ledger::SubscriptionLedger;
use crate::listings::ListingLifecycle;
use crate::payments::PaymentReconciliation;

/// The assembled marketplace engine.
///
/// Holds the four core components behind one handle. Collaborator adapters
/// (notifications, image storage) are optional; the database is required.
pub struct Marketplace {
    config: Arc<MarketConfig>,
    database: Arc<dyn DatabaseAdapter>,
    catalog: PlanCatalog,
    ledger: SubscriptionLedger,
    listings: ListingLifecycle,
    payments: PaymentReconciliation,
}

impl std::fmt::Debug for Marketplace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Marketplace")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Marketplace {
    pub fn builder(config: MarketConfig) -> MarketBuilder {
        MarketBuilder::new(config)
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn database(&self) -> &Arc<dyn DatabaseAdapter> {
        &self.database
    }

    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    pub fn ledger(&self) -> &SubscriptionLedger {
        &self.ledger
    }

    pub fn listings(&self) -> &ListingLifecycle {
        &self.listings
    }

    pub fn payments(&self) -> &PaymentReconciliation {
        &self.payments
    }

    /// Explicit state-transition hook invoked by the identity component when
    /// a user becomes verified. Marks the user verified and assigns the
    /// default free-plan subscription if the user holds no active one.
    /// Idempotent: repeated invocations never create duplicate subscriptions.
    pub async fn on_user_verified(&self, user_id: &str) -> MarketResult<Option<Subscription>> {
        self.database.set_user_verified(user_id, true).await?;
        self.ledger.ensure_default_subscription(user_id).await
    }
}

/// Builder for configuring a [`Marketplace`].
pub struct MarketBuilder {
    config: MarketConfig,
    database: Option<Arc<dyn DatabaseAdapter>>,
    notifier: Option<Arc<dyn NotificationAdapter>>,
    images: Option<Arc<dyn ImageStorageAdapter>>,
}

impl MarketBuilder {
    pub fn new(config: MarketConfig) -> Self {
        Self {
            config,
            database: None,
            notifier: None,
            images: None,
        }
    }

    /// Set the database adapter
    pub fn database<D: DatabaseAdapter>(mut self, database: D) -> Self {
        self.database = Some(Arc::new(database));
        self
    }

    pub fn database_arc(mut self, database: Arc<dyn DatabaseAdapter>) -> Self {
        self.database = Some(database);
        self
    }

    pub fn notifications<N: NotificationAdapter>(mut self, notifier: N) -> Self {
        self.notifier = Some(Arc::new(notifier));
        self
    }

    pub fn notifications_arc(mut self, notifier: Arc<dyn NotificationAdapter>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn image_storage<I: ImageStorageAdapter>(mut self, images: I) -> Self {
        self.images = Some(Arc::new(images));
        self
    }

    pub fn image_storage_arc(mut self, images: Arc<dyn ImageStorageAdapter>) -> Self {
        self.images = Some(images);
        self
    }

    /// Build the [`Marketplace`] instance.
    pub fn build(self) -> MarketResult<Marketplace> {
        self.config.validate()?;

        let database = self
            .database
            .ok_or_else(|| MarketError::validation("A database adapter is required"))?;
        let config = Arc::new(self.config);

        let catalog = PlanCatalog::new(database.clone(), config.clone());
        let ledger = SubscriptionLedger::new(database.clone(), catalog.clone(), self.notifier.clone());
        let listings = ListingLifecycle::new(
            database.clone(),
            config.clone(),
            self.notifier.clone(),
            self.images.clone(),
        );
        let payments = PaymentReconciliation::new(
            database.clone(),
            config.clone(),
            ledger.clone(),
            self.notifier.clone(),
        );

        Ok(Marketplace {
            config,
            database,
            catalog,
            ledger,
            listings,
            payments,
        })
    }
}

/// Deliver a notification, logging and suppressing any failure. Collaborator
/// outages must never surface as request failures.
pub(crate) async fn notify_or_log(
    notifier: &Option<Arc<dyn NotificationAdapter>>,
    user_id: &str,
    kind: NotificationKind,
    payload: serde_json::Value,
) {
    if let Some(notifier) = notifier {
        if let Err(e) = notifier.notify(user_id, kind, payload).await {
            tracing::warn!(
                user = user_id,
                kind = kind.as_str(),
                error = %e,
                "Failed to deliver notification"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soko_core::MemoryDatabaseAdapter;

    #[test]
    fn build_requires_database() {
        let err = Marketplace::builder(MarketConfig::default())
            .build()
            .unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));
    }

    #[test]
    fn build_validates_config() {
        let config = MarketConfig::new().payment_reference_prefix("");
        let err = Marketplace::builder(config)
            .database(MemoryDatabaseAdapter::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));
    }

    #[test]
    fn build_succeeds_with_database_only() {
        let market = Marketplace::builder(MarketConfig::default())
            .database(MemoryDatabaseAdapter::new())
            .build();
        assert!(market.is_ok());
    }
}
