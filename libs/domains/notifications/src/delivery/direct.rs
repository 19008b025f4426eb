//! Direct strategy: single sends go straight to the vendor and whole batches
//! are handed to the vendor's batch API.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{BatchOutcome, DeliveryStrategy, abort_batch, failure_reason, finish_batch, send_single};
use crate::batch::NotificationBatch;
use crate::error::{NotificationError, NotificationResult};
use crate::notification::Notification;
use crate::providers::BatchNotificationProvider;

const NOT_REPORTED: &str = "no result reported by provider";

/// Delivery through a batch-capable vendor (e.g. the email API).
pub struct DirectDelivery<P: BatchNotificationProvider> {
    provider: Arc<P>,
}

impl<P: BatchNotificationProvider> DirectDelivery<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }

    /// Create a strategy sharing an existing provider.
    pub fn with_arc(provider: Arc<P>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

#[async_trait]
impl<P: BatchNotificationProvider + 'static> DeliveryStrategy for DirectDelivery<P> {
    async fn deliver_single(&self, notification: &mut Notification) -> NotificationResult<()> {
        send_single(self.provider.as_ref(), notification).await
    }

    async fn deliver_batch(&self, batch: &mut NotificationBatch) -> NotificationResult<BatchOutcome> {
        if !batch.can_be_processed() {
            return Err(NotificationError::CannotProcess {
                id: batch.id(),
                status: batch.status().to_string(),
            });
        }
        batch.start_processing()?;

        info!(
            batch_id = %batch.id(),
            channel = %batch.channel(),
            size = batch.len(),
            provider = self.provider.name(),
            "Sending batch through provider batch API"
        );

        let report = match self.provider.send_batch(batch).await {
            Ok(report) => report,
            Err(err) => {
                abort_batch(batch, format!("batch send failed: {}", failure_reason(&err.message)))?;
                return Err(err.into());
            }
        };

        let mut failed = 0;
        for notification in batch.notifications_mut() {
            let id = notification.id();
            // a reported failure wins over a success entry for the same id
            let reason = match report.failure_for(id) {
                Some(message) => failure_reason(message),
                None if report.succeeded_contains(id) => {
                    notification.mark_as_sent()?;
                    continue;
                }
                None => NOT_REPORTED.to_string(),
            };
            debug!(notification_id = %id, reason = %reason, "Batch member failed");
            notification.mark_as_failed(reason)?;
            failed += 1;
        }

        finish_batch(batch, failed, 1)
    }

    fn supports_batch(&self) -> bool {
        true
    }
}
