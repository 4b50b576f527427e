use std::sync::Arc;

use rust_decimal::Decimal;
use soko_core::adapters::DatabaseAdapter;
use soko_core::{CategoryScope, CreatePlan, MarketConfig, MarketError, MarketResult, Plan};

/// Plan Catalog: read-only access to pricing plans.
///
/// Administrative plan edits live outside the engine; the one write this
/// component performs is bootstrapping the configured free plan.
#[derive(Clone)]
pub struct PlanCatalog {
    database: Arc<dyn DatabaseAdapter>,
    config: Arc<MarketConfig>,
}

impl PlanCatalog {
    pub(crate) fn new(database: Arc<dyn DatabaseAdapter>, config: Arc<MarketConfig>) -> Self {
        Self { database, config }
    }

    pub async fn get_plan(&self, id: &str) -> MarketResult<Plan> {
        self.database
            .get_plan(id)
            .await?
            .ok_or_else(|| MarketError::not_found("Plan not found"))
    }

    pub async fn list_active_plans(&self) -> MarketResult<Vec<Plan>> {
        self.database.list_active_plans().await
    }

    /// The active zero-price plan, created from `MarketConfig::default_plan`
    /// if it does not exist yet.
    pub async fn ensure_free_plan(&self) -> MarketResult<Plan> {
        if let Some(plan) = self.database.find_free_plan().await? {
            return Ok(plan);
        }

        let defaults = &self.config.default_plan;
        let plan = self
            .database
            .create_plan(CreatePlan {
                name: defaults.name.clone(),
                description: defaults.description.clone(),
                price: Decimal::ZERO,
                duration_days: defaults.duration_days,
                category_scope: CategoryScope::All,
                max_listings: defaults.max_listings,
                max_images_per_listing: defaults.max_images_per_listing,
                is_featured: false,
                is_active: true,
            })
            .await?;

        tracing::info!(plan = %plan.name, "Created default free plan");
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_helpers::test_market;
    use rust_decimal_macros::dec;
    use soko_core::MarketError;

    #[tokio::test]
    async fn get_plan_unknown_is_not_found() {
        let (market, _) = test_market();
        let err = market.catalog().get_plan("nope").await.unwrap_err();
        assert!(matches!(err, MarketError::NotFound(_)));
    }

    #[tokio::test]
    async fn ensure_free_plan_is_idempotent() {
        let (market, _) = test_market();

        let first = market.catalog().ensure_free_plan().await.unwrap();
        let second = market.catalog().ensure_free_plan().await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.price, dec!(0));
        assert_eq!(first.name, "Basic Plan");
    }

    #[tokio::test]
    async fn list_active_plans_hides_retired_plans() {
        let (market, helpers) = test_market();
        helpers.seed_plan("Live", dec!(10), 30, 5, false, true).await;
        helpers.seed_plan("Retired", dec!(20), 30, 5, false, false).await;

        let plans = market.catalog().list_active_plans().await.unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].name, "Live");
    }
}
