//! Channel vendor interfaces.
//!
//! Strategies talk to vendors only through these traits. Concrete gateway
//! and email HTTP clients live outside the delivery core.

mod in_memory;

pub use in_memory::InMemoryProvider;

use async_trait::async_trait;

use crate::batch::NotificationBatch;
use crate::error::ProviderError;
use crate::models::NotificationId;
use crate::notification::Notification;

/// Per-member outcome of a vendor batch send.
///
/// Members that appear in neither list are treated as failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSendReport {
    /// Members the vendor accepted.
    pub succeeded: Vec<NotificationId>,
    /// Members the vendor rejected, with its failure message.
    pub failed: Vec<(NotificationId, String)>,
}

impl BatchSendReport {
    pub fn succeeded_contains(&self, id: NotificationId) -> bool {
        self.succeeded.contains(&id)
    }

    pub fn failure_for(&self, id: NotificationId) -> Option<&str> {
        self.failed
            .iter()
            .find(|(failed_id, _)| *failed_id == id)
            .map(|(_, reason)| reason.as_str())
    }
}

/// A vendor that sends one notification per call.
#[async_trait]
pub trait NotificationProvider: Send + Sync {
    /// Send a single notification.
    async fn send(&self, notification: &Notification) -> Result<(), ProviderError>;

    /// Get the provider name for logging.
    fn name(&self) -> &'static str;
}

/// A vendor that can take a whole batch in one call.
#[async_trait]
pub trait BatchNotificationProvider: NotificationProvider {
    /// Send every member of the batch and report which ones went out.
    async fn send_batch(&self, batch: &NotificationBatch) -> Result<BatchSendReport, ProviderError>;
}
