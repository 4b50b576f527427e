use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::MarketResult;
use crate::types::NotificationKind;

/// Notification delivery adapter.
///
/// All calls from the engine are fire-and-forget: a failed delivery is
/// logged and never rolls back or fails the operation that triggered it.
#[async_trait]
pub trait NotificationAdapter: Send + Sync + 'static {
    async fn notify(
        &self,
        user_id: &str,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> MarketResult<()>;
}

/// A delivered notification, as recorded by [`MemoryNotificationAdapter`].
#[derive(Debug, Clone)]
pub struct RecordedNotification {
    pub user_id: String,
    pub kind: NotificationKind,
    pub payload: serde_json::Value,
}

/// In-memory notification adapter that records deliveries for inspection.
#[derive(Default)]
pub struct MemoryNotificationAdapter {
    sent: Mutex<Vec<RecordedNotification>>,
}

impl MemoryNotificationAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<RecordedNotification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_of_kind(&self, kind: NotificationKind) -> Vec<RecordedNotification> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationAdapter for MemoryNotificationAdapter {
    async fn notify(
        &self,
        user_id: &str,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> MarketResult<()> {
        self.sent.lock().unwrap().push(RecordedNotification {
            user_id: user_id.to_string(),
            kind,
            payload,
        });
        Ok(())
    }
}
