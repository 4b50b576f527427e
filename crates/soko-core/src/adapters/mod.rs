pub mod database;
pub mod images;
pub mod memory;
pub mod notify;

pub use database::DatabaseAdapter;
pub use images::{ImageStorageAdapter, MemoryImageStorage};
pub use memory::MemoryDatabaseAdapter;
pub use notify::{MemoryNotificationAdapter, NotificationAdapter, RecordedNotification};

#[cfg(feature = "sqlx-postgres")]
pub use database::{PoolConfig, SqlxAdapter};
