use async_trait::async_trait;

use crate::batch::NotificationBatch;
use crate::error::NotificationResult;
use crate::events::NotificationEvent;
use crate::notification::Notification;

/// Persistence port for notifications and batches.
///
/// Implementations store the `to_record()` shape of each aggregate.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Store a newly created notification
    async fn save(&self, notification: &Notification) -> NotificationResult<()>;

    /// Persist the current status of a notification
    async fn update(&self, notification: &Notification) -> NotificationResult<()>;

    /// Store a newly created batch with its members
    async fn save_batch(&self, batch: &NotificationBatch) -> NotificationResult<()>;

    /// Persist the current status of a batch and its members
    async fn update_batch(&self, batch: &NotificationBatch) -> NotificationResult<()>;
}

/// Outbound port for delivery events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: NotificationEvent) -> NotificationResult<()>;
}
