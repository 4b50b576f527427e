use async_trait::async_trait;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::{MarketError, MarketResult};
use crate::types::{ImageRef, ImageUpload};

/// Image storage adapter.
///
/// The engine enforces the per-plan image count ceiling and the acceptance
/// checks (content type, size) before calling in; storage, transcoding and
/// URL generation live behind this trait. A failed store of one file is
/// logged by the engine and never fails the surrounding request.
#[async_trait]
pub trait ImageStorageAdapter: Send + Sync + 'static {
    async fn store_image(
        &self,
        listing_id: &str,
        upload: &ImageUpload,
        display_order: i32,
    ) -> MarketResult<ImageRef>;

    async fn list_images(&self, listing_id: &str) -> MarketResult<Vec<ImageRef>>;
}

/// In-memory image storage for tests and examples.
#[derive(Default)]
pub struct MemoryImageStorage {
    images: Mutex<Vec<ImageRef>>,
}

impl MemoryImageStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ImageStorageAdapter for MemoryImageStorage {
    async fn store_image(
        &self,
        listing_id: &str,
        upload: &ImageUpload,
        display_order: i32,
    ) -> MarketResult<ImageRef> {
        if upload.data.is_empty() {
            return Err(MarketError::validation("Empty image upload"));
        }
        let image = ImageRef {
            id: Uuid::new_v4().to_string(),
            listing_id: listing_id.to_string(),
            url: format!("memory://listings/{}/{}.jpg", listing_id, Uuid::new_v4().simple()),
            is_primary: display_order == 0,
            display_order,
        };
        self.images.lock().unwrap().push(image.clone());
        Ok(image)
    }

    async fn list_images(&self, listing_id: &str) -> MarketResult<Vec<ImageRef>> {
        let mut images: Vec<ImageRef> = self
            .images
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.listing_id == listing_id)
            .cloned()
            .collect();
        images.sort_by_key(|i| i.display_order);
        Ok(images)
    }
}
