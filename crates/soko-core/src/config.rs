use crate::error::{MarketError, MarketResult};

/// Engine configuration.
///
/// Plain data; the adapters (database, images, notifications) are attached
/// on the engine builder, not here.
#[derive(Debug, Clone)]
pub struct MarketConfig {
    /// Prefix for human-shareable payment reference codes ("SOKO-AB12CD34EF").
    pub payment_reference_prefix: String,
    /// Definition of the zero-price plan auto-assigned to verified users.
    pub default_plan: DefaultPlanConfig,
    /// Per-file upload size ceiling in bytes.
    pub max_image_bytes: usize,
    /// Accepted image content types; anything else is skipped, not rejected.
    pub allowed_image_types: Vec<String>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            payment_reference_prefix: "SOKO".to_string(),
            default_plan: DefaultPlanConfig::default(),
            max_image_bytes: 5 * 1024 * 1024,
            allowed_image_types: vec![
                "image/jpeg".to_string(),
                "image/jpg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
            ],
        }
    }
}

impl MarketConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payment_reference_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.payment_reference_prefix = prefix.into();
        self
    }

    pub fn default_plan(mut self, plan: DefaultPlanConfig) -> Self {
        self.default_plan = plan;
        self
    }

    pub fn max_image_bytes(mut self, bytes: usize) -> Self {
        self.max_image_bytes = bytes;
        self
    }

    /// Validate the configuration before the engine is built.
    pub fn validate(&self) -> MarketResult<()> {
        if self.payment_reference_prefix.is_empty() {
            return Err(MarketError::validation(
                "payment_reference_prefix must not be empty",
            ));
        }
        if self.default_plan.max_listings < 1 {
            return Err(MarketError::validation(
                "default_plan.max_listings must be at least 1",
            ));
        }
        if self.default_plan.max_images_per_listing < 1 {
            return Err(MarketError::validation(
                "default_plan.max_images_per_listing must be at least 1",
            ));
        }
        if self.default_plan.duration_days < 0 {
            return Err(MarketError::validation(
                "default_plan.duration_days must not be negative",
            ));
        }
        Ok(())
    }
}

/// Settings of the auto-created free plan. The subscription granted on it
/// never expires regardless of `duration_days`, which only bounds the
/// lifetime of listings created under it.
#[derive(Debug, Clone)]
pub struct DefaultPlanConfig {
    pub name: String,
    pub description: String,
    pub duration_days: i32,
    pub max_listings: i32,
    pub max_images_per_listing: i32,
}

impl Default for DefaultPlanConfig {
    fn default() -> Self {
        Self {
            name: "Basic Plan".to_string(),
            description: "Perfect for occasional sellers".to_string(),
            duration_days: 60,
            max_listings: 1,
            max_images_per_listing: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(MarketConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_reference_prefix_is_rejected() {
        let config = MarketConfig::new().payment_reference_prefix("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_quota_default_plan_is_rejected() {
        let mut config = MarketConfig::default();
        config.default_plan.max_listings = 0;
        assert!(config.validate().is_err());
    }
}
