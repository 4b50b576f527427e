use std::sync::Arc;

use chrono::Utc;
use soko_core::adapters::{DatabaseAdapter, ImageStorageAdapter, NotificationAdapter};
use soko_core::{
    CreateListing, CreateListingRequest, ImageRef, ImageUpload, Listing, ListingStatus,
    MarketConfig, MarketError, MarketResult, NotificationKind, Plan, Subscription,
};
use validator::Validate;

use crate::market::notify_or_log;

/// Outcome of a successful listing creation.
#[derive(Debug, Clone)]
pub struct ListingCreated {
    pub listing: Listing,
    pub subscription: Subscription,
    pub plan: Plan,
    pub images: Vec<ImageRef>,
}

/// Listing Lifecycle: creation under quota, seller status transitions, and
/// owner-scoped reads.
#[derive(Clone)]
pub struct ListingLifecycle {
    database: Arc<dyn DatabaseAdapter>,
    config: Arc<MarketConfig>,
    notifier: Option<Arc<dyn NotificationAdapter>>,
    images: Option<Arc<dyn ImageStorageAdapter>>,
}

impl ListingLifecycle {
    pub(crate) fn new(
        database: Arc<dyn DatabaseAdapter>,
        config: Arc<MarketConfig>,
        notifier: Option<Arc<dyn NotificationAdapter>>,
        images: Option<Arc<dyn ImageStorageAdapter>>,
    ) -> Self {
        Self {
            database,
            config,
            notifier,
            images,
        }
    }

    /// Create a listing for `user_id`, consuming one quota unit.
    ///
    /// Checks run in order: request validation, account verification, active
    /// subscription, remaining quota. The listing is created directly in
    /// `Active` status, inherits the plan's featured flag, and expires when
    /// the plan's duration says so. Image uploads beyond the plan's ceiling,
    /// of a disallowed type, or oversized are skipped, never rejected.
    pub async fn create_listing(
        &self,
        user_id: &str,
        request: CreateListingRequest,
    ) -> MarketResult<ListingCreated> {
        request.validate()?;

        let user = self
            .database
            .get_user(user_id)
            .await?
            .ok_or_else(|| MarketError::not_found("User not found"))?;
        if !user.is_verified {
            return Err(MarketError::VerificationRequired);
        }

        let subscription = self
            .database
            .get_active_subscription(user_id)
            .await?
            .ok_or(MarketError::NoSubscription)?;
        let plan = self
            .database
            .get_plan(&subscription.plan_id)
            .await?
            .ok_or_else(|| MarketError::not_found("Plan not found"))?;

        // Pre-flight check for the friendly error; the adapter re-checks
        // atomically anyway and racing callers lose with the same error.
        if !subscription.has_quota(&plan) {
            return Err(MarketError::QuotaExceeded {
                plan: plan.name.clone(),
                max_listings: plan.max_listings,
                used: subscription.listings_used,
            });
        }

        let (listing, subscription) = self
            .database
            .create_active_listing(
                CreateListing {
                    user_id: user_id.to_string(),
                    category_id: request.category_id,
                    title: request.title,
                    description: request.description,
                    price: request.price,
                    location: request.location,
                },
                &subscription.id,
                plan.expiry_from(Utc::now()),
                plan.is_featured,
            )
            .await?;

        let images = self
            .attach_images(&listing.id, &request.images, plan.max_images_per_listing)
            .await;

        tracing::info!(
            user = user_id,
            listing = %listing.id,
            plan = %plan.name,
            used = subscription.listings_used,
            "Listing created"
        );

        notify_or_log(
            &self.notifier,
            user_id,
            NotificationKind::ListingActivated,
            serde_json::json!({
                "listingId": listing.id,
                "title": listing.title,
            }),
        )
        .await;

        Ok(ListingCreated {
            listing,
            subscription,
            plan,
            images,
        })
    }

    /// Store accepted uploads, capped at `max_images`. Each file is checked
    /// independently; a bad or failed file is logged and skipped.
    async fn attach_images(
        &self,
        listing_id: &str,
        uploads: &[ImageUpload],
        max_images: i32,
    ) -> Vec<ImageRef> {
        let Some(storage) = &self.images else {
            return Vec::new();
        };

        let mut stored = Vec::new();
        for upload in uploads {
            if stored.len() as i32 >= max_images {
                tracing::warn!(
                    listing = listing_id,
                    limit = max_images,
                    "Image count limit reached, skipping remaining uploads"
                );
                break;
            }
            if !self.accepts_upload(listing_id, upload) {
                continue;
            }
            match storage
                .store_image(listing_id, upload, stored.len() as i32)
                .await
            {
                Ok(image) => stored.push(image),
                Err(e) => {
                    tracing::warn!(
                        listing = listing_id,
                        file = %upload.file_name,
                        error = %e,
                        "Failed to store image, skipping"
                    );
                }
            }
        }
        stored
    }

    fn accepts_upload(&self, listing_id: &str, upload: &ImageUpload) -> bool {
        if !self
            .config
            .allowed_image_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&upload.content_type))
        {
            tracing::warn!(
                listing = listing_id,
                file = %upload.file_name,
                content_type = %upload.content_type,
                "Skipping upload with disallowed content type"
            );
            return false;
        }
        if upload.data.len() > self.config.max_image_bytes {
            tracing::warn!(
                listing = listing_id,
                file = %upload.file_name,
                size = upload.data.len(),
                "Skipping oversized upload"
            );
            return false;
        }
        true
    }

    /// Seller-initiated status change. Only `Sold` and `Hidden` are allowed
    /// here; activation happens through payment reconciliation and expiry
    /// through the scheduler's clock, never through this call.
    ///
    /// Moving a listing out of `Active` returns its quota unit to the
    /// owner's active subscription, best-effort: a failed release is logged
    /// and the status change stands.
    pub async fn change_status(
        &self,
        user_id: &str,
        listing_id: &str,
        status: ListingStatus,
    ) -> MarketResult<Listing> {
        if !matches!(status, ListingStatus::Sold | ListingStatus::Hidden) {
            return Err(MarketError::forbidden_transition(format!(
                "sellers may only mark listings sold or hidden, not {status}"
            )));
        }

        let listing = self
            .database
            .get_listing(listing_id)
            .await?
            .ok_or_else(|| MarketError::not_found("Listing not found"))?;
        if listing.user_id != user_id {
            return Err(MarketError::forbidden(
                "You can only update your own listings",
            ));
        }

        let was_active = listing.status == ListingStatus::Active;
        let listing = self.database.update_listing_status(listing_id, status).await?;

        if was_active {
            match self.database.get_active_subscription(user_id).await? {
                Some(sub) => {
                    if let Err(e) = self.database.release_quota(&sub.id).await {
                        tracing::warn!(
                            user = user_id,
                            listing = listing_id,
                            error = %e,
                            "Failed to release quota after status change"
                        );
                    }
                }
                None => {
                    tracing::debug!(
                        user = user_id,
                        listing = listing_id,
                        "No active subscription to release quota to"
                    );
                }
            }
        }

        notify_or_log(
            &self.notifier,
            user_id,
            NotificationKind::ListingStatusChanged,
            serde_json::json!({
                "listingId": listing.id,
                "status": listing.status.as_str(),
            }),
        )
        .await;

        Ok(listing)
    }

    /// Permanently remove a listing. Deletion does not return quota; only
    /// the sold/hidden transitions do.
    pub async fn delete_listing(&self, user_id: &str, listing_id: &str) -> MarketResult<()> {
        let listing = self
            .database
            .get_listing(listing_id)
            .await?
            .ok_or_else(|| MarketError::not_found("Listing not found"))?;
        if listing.user_id != user_id {
            return Err(MarketError::forbidden(
                "You can only delete your own listings",
            ));
        }

        self.database.delete_listing(listing_id).await?;
        tracing::info!(user = user_id, listing = listing_id, "Listing deleted");
        Ok(())
    }

    pub async fn get_listing(&self, listing_id: &str) -> MarketResult<Listing> {
        self.database
            .get_listing(listing_id)
            .await?
            .ok_or_else(|| MarketError::not_found("Listing not found"))
    }

    /// All listings owned by `user_id`, any status, newest first.
    pub async fn my_listings(&self, user_id: &str) -> MarketResult<Vec<Listing>> {
        self.database.list_user_listings(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use crate::test_helpers::{listing_request, test_market};
    use rust_decimal_macros::dec;
    use soko_core::{ImageUpload, ListingStatus, MarketError, NotificationKind};

    #[tokio::test]
    async fn create_listing_activates_and_consumes_quota() {
        let (market, helpers) = test_market();
        let user = helpers.seed_user("seller@s.ko", true).await;
        let plan = helpers.seed_plan("Basic", dec!(0), 60, 1, false, true).await;
        helpers.subscribe(&user, &plan).await;

        let created = market
            .listings()
            .create_listing(&user.id, listing_request("Bike"))
            .await
            .unwrap();

        assert_eq!(created.listing.status, ListingStatus::Active);
        assert!(!created.listing.is_featured);
        assert!(created.listing.expiration_date.is_some());
        assert_eq!(created.subscription.listings_used, 1);

        // Creating a first listing makes the user a seller.
        let user = helpers.get_user(&user.id).await;
        assert!(user.is_seller);
    }

    #[tokio::test]
    async fn create_listing_requires_verification() {
        let (market, helpers) = test_market();
        let user = helpers.seed_user("new@s.ko", false).await;

        let err = market
            .listings()
            .create_listing(&user.id, listing_request("Bike"))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::VerificationRequired));
    }

    #[tokio::test]
    async fn create_listing_requires_subscription() {
        let (market, helpers) = test_market();
        let user = helpers.seed_user("seller@s.ko", true).await;

        let err = market
            .listings()
            .create_listing(&user.id, listing_request("Bike"))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::NoSubscription));
    }

    #[tokio::test]
    async fn quota_error_carries_plan_details() {
        let (market, helpers) = test_market();
        let user = helpers.seed_user("seller@s.ko", true).await;
        let plan = helpers.seed_plan("Basic", dec!(0), 60, 1, false, true).await;
        helpers.subscribe(&user, &plan).await;

        market
            .listings()
            .create_listing(&user.id, listing_request("First"))
            .await
            .unwrap();
        let err = market
            .listings()
            .create_listing(&user.id, listing_request("Second"))
            .await
            .unwrap_err();

        match err {
            MarketError::QuotaExceeded {
                plan,
                max_listings,
                used,
            } => {
                assert_eq!(plan, "Basic");
                assert_eq!(max_listings, 1);
                assert_eq!(used, 1);
            }
            other => panic!("expected QuotaExceeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn featured_plan_creates_featured_listings() {
        let (market, helpers) = test_market();
        let user = helpers.seed_user("seller@s.ko", true).await;
        let plan = helpers.seed_plan("Premium", dec!(50), 30, 10, true, true).await;
        helpers.subscribe(&user, &plan).await;

        let created = market
            .listings()
            .create_listing(&user.id, listing_request("Apartment"))
            .await
            .unwrap();
        assert!(created.listing.is_featured);
    }

    #[tokio::test]
    async fn excess_and_invalid_images_are_skipped() {
        let (market, helpers) = test_market();
        let user = helpers.seed_user("seller@s.ko", true).await;
        let plan = helpers.seed_plan("Tiny", dec!(5), 30, 3, false, true).await;
        helpers.subscribe(&user, &plan).await;

        let good = |name: &str| ImageUpload {
            file_name: name.to_string(),
            content_type: "image/jpeg".to_string(),
            data: vec![0u8; 128],
        };
        let mut request = listing_request("Car");
        request.images = vec![
            good("a.jpg"),
            ImageUpload {
                file_name: "doc.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                data: vec![0u8; 128],
            },
            good("b.jpg"),
            good("c.jpg"),
            good("d.jpg"),
            good("e.jpg"),
            good("f.jpg"),
        ];

        let created = market
            .listings()
            .create_listing(&user.id, request)
            .await
            .unwrap();

        // pdf skipped, remaining good files stored up to the plan ceiling.
        assert_eq!(created.images.len(), created.plan.max_images_per_listing as usize);
        assert!(created.images[0].is_primary);
        assert!(created.images.iter().skip(1).all(|i| !i.is_primary));
    }

    #[tokio::test]
    async fn hiding_active_listing_releases_quota() {
        let (market, helpers) = test_market();
        let user = helpers.seed_user("seller@s.ko", true).await;
        let plan = helpers.seed_plan("Basic", dec!(0), 60, 1, false, true).await;
        let sub = helpers.subscribe(&user, &plan).await;

        let created = market
            .listings()
            .create_listing(&user.id, listing_request("Bike"))
            .await
            .unwrap();
        market
            .listings()
            .change_status(&user.id, &created.listing.id, ListingStatus::Hidden)
            .await
            .unwrap();

        let sub = helpers.get_subscription(&sub.id).await;
        assert_eq!(sub.listings_used, 0);

        // The freed quota unit admits a new listing.
        let again = market
            .listings()
            .create_listing(&user.id, listing_request("Scooter"))
            .await
            .unwrap();
        assert_eq!(again.subscription.listings_used, 1);
    }

    #[tokio::test]
    async fn status_change_skips_release_when_subscription_lapsed() {
        let (market, helpers) = test_market();
        let user = helpers.seed_user("seller@s.ko", true).await;
        let plan = helpers.seed_plan("Short", dec!(5), 30, 2, false, true).await;
        let sub = helpers
            .subscribe_expiring(&user, &plan, chrono::Utc::now() + chrono::Duration::milliseconds(200))
            .await;

        let created = market
            .listings()
            .create_listing(&user.id, listing_request("Bike"))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;

        // The subscription has lapsed; the status change still goes through
        // and the release is skipped rather than erroring.
        let listing = market
            .listings()
            .change_status(&user.id, &created.listing.id, ListingStatus::Sold)
            .await
            .unwrap();
        assert_eq!(listing.status, ListingStatus::Sold);

        let sub = helpers.get_subscription(&sub.id).await;
        assert_eq!(sub.listings_used, 1);
    }

    #[tokio::test]
    async fn hiding_non_active_listing_releases_nothing() {
        let (market, helpers) = test_market();
        let user = helpers.seed_user("seller@s.ko", true).await;
        let plan = helpers.seed_plan("Basic", dec!(0), 60, 2, false, true).await;
        let sub = helpers.subscribe(&user, &plan).await;

        let created = market
            .listings()
            .create_listing(&user.id, listing_request("Bike"))
            .await
            .unwrap();
        market
            .listings()
            .change_status(&user.id, &created.listing.id, ListingStatus::Sold)
            .await
            .unwrap();
        // Sold -> Hidden: no second release for the same unit.
        market
            .listings()
            .change_status(&user.id, &created.listing.id, ListingStatus::Hidden)
            .await
            .unwrap();

        let sub = helpers.get_subscription(&sub.id).await;
        assert_eq!(sub.listings_used, 0);
    }

    #[tokio::test]
    async fn only_sold_and_hidden_are_seller_transitions() {
        let (market, helpers) = test_market();
        let user = helpers.seed_user("seller@s.ko", true).await;
        let plan = helpers.seed_plan("Basic", dec!(0), 60, 1, false, true).await;
        helpers.subscribe(&user, &plan).await;
        let created = market
            .listings()
            .create_listing(&user.id, listing_request("Bike"))
            .await
            .unwrap();

        for status in [
            ListingStatus::Active,
            ListingStatus::Pending,
            ListingStatus::Expired,
        ] {
            let err = market
                .listings()
                .change_status(&user.id, &created.listing.id, status)
                .await
                .unwrap_err();
            assert!(matches!(err, MarketError::ForbiddenTransition(_)));
        }
    }

    #[tokio::test]
    async fn status_change_is_owner_scoped() {
        let (market, helpers) = test_market();
        let owner = helpers.seed_user("owner@s.ko", true).await;
        let other = helpers.seed_user("other@s.ko", true).await;
        let plan = helpers.seed_plan("Basic", dec!(0), 60, 1, false, true).await;
        helpers.subscribe(&owner, &plan).await;
        let created = market
            .listings()
            .create_listing(&owner.id, listing_request("Bike"))
            .await
            .unwrap();

        let err = market
            .listings()
            .change_status(&other.id, &created.listing.id, ListingStatus::Sold)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Forbidden(_)));
    }

    #[tokio::test]
    async fn delete_does_not_release_quota() {
        let (market, helpers) = test_market();
        let user = helpers.seed_user("seller@s.ko", true).await;
        let plan = helpers.seed_plan("Basic", dec!(0), 60, 1, false, true).await;
        let sub = helpers.subscribe(&user, &plan).await;
        let created = market
            .listings()
            .create_listing(&user.id, listing_request("Bike"))
            .await
            .unwrap();

        market
            .listings()
            .delete_listing(&user.id, &created.listing.id)
            .await
            .unwrap();

        let sub = helpers.get_subscription(&sub.id).await;
        assert_eq!(sub.listings_used, 1);
        assert!(market
            .listings()
            .get_listing(&created.listing.id)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn creation_emits_activation_notification() {
        let (market, helpers) = test_market();
        let user = helpers.seed_user("seller@s.ko", true).await;
        let plan = helpers.seed_plan("Basic", dec!(0), 60, 1, false, true).await;
        helpers.subscribe(&user, &plan).await;

        market
            .listings()
            .create_listing(&user.id, listing_request("Bike"))
            .await
            .unwrap();

        let sent = helpers
            .notifier
            .sent_of_kind(NotificationKind::ListingActivated);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].user_id, user.id);
    }
}
