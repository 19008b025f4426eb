//! Throttled strategy: batches are split into fixed-size chunks and sent one
//! notification at a time through the shared rate limiter.
//!
//! Chunks run strictly one after another with a pause between consecutive
//! chunks. A failed member does not stop the rest of the batch.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{BatchOutcome, DeliveryStrategy, abort_batch, failure_reason, finish_batch, send_single};
use crate::batch::NotificationBatch;
use crate::config::ChunkingConfig;
use crate::error::{NotificationError, NotificationResult};
use crate::notification::Notification;
use crate::providers::NotificationProvider;
use crate::rate_limiter::RateLimiter;

/// Delivery through a single-send vendor with pacing (e.g. the messaging
/// gateway).
pub struct ThrottledDelivery<P: NotificationProvider> {
    provider: Arc<P>,
    rate_limiter: Arc<RateLimiter>,
    chunking: ChunkingConfig,
}

impl<P: NotificationProvider> ThrottledDelivery<P> {
    pub fn new(provider: P, rate_limiter: Arc<RateLimiter>, chunking: ChunkingConfig) -> Self {
        Self::with_arc(Arc::new(provider), rate_limiter, chunking)
    }

    /// Create a strategy sharing an existing provider.
    pub fn with_arc(provider: Arc<P>, rate_limiter: Arc<RateLimiter>, chunking: ChunkingConfig) -> Self {
        Self {
            provider,
            rate_limiter,
            chunking,
        }
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Run a batch that has already entered `processing` and close it.
    ///
    /// Any error other than a member's vendor failure aborts the batch: the
    /// members still pending are failed and the error is returned.
    async fn deliver_processing(&self, batch: &mut NotificationBatch) -> NotificationResult<BatchOutcome> {
        let chunks = self.chunking.chunk_count(batch.len());
        info!(
            batch_id = %batch.id(),
            channel = %batch.channel(),
            size = batch.len(),
            chunks,
            "Sending batch in chunks"
        );

        match self.process_chunks(batch).await {
            Ok(failed) => finish_batch(batch, failed, chunks),
            Err(err) => {
                abort_batch(batch, format!("batch processing aborted: {err}"))?;
                Err(err)
            }
        }
    }

    /// Send every chunk; returns the number of members that failed.
    async fn process_chunks(&self, batch: &mut NotificationBatch) -> NotificationResult<usize> {
        let service_key = batch.channel().rate_limit_key();
        let total = batch.len();
        let size = self.chunking.chunk_size;
        let chunks = self.chunking.chunk_count(total);
        let mut failed = 0;

        for chunk in 0..chunks {
            if chunk > 0 {
                info!(
                    batch_id = %batch.id(),
                    next_chunk = chunk + 1,
                    chunks,
                    delay_ms = self.chunking.chunk_delay.as_millis() as u64,
                    "Pausing between chunks"
                );
                tokio::time::sleep(self.chunking.chunk_delay).await;
            }

            let start = chunk * size;
            let end = (start + size).min(total);
            debug!(batch_id = %batch.id(), chunk = chunk + 1, chunks, start, end, "Processing chunk");

            for index in start..end {
                self.rate_limiter.check_and_wait_if_needed(service_key).await;
                let result = self.provider.send(&batch.notifications()[index]).await;

                let notification = &mut batch.notifications_mut()[index];
                match result {
                    Ok(()) => notification.mark_as_sent()?,
                    Err(err) => {
                        warn!(
                            notification_id = %notification.id(),
                            provider = self.provider.name(),
                            error = %err,
                            "Batch member send failed, continuing"
                        );
                        notification.mark_as_failed(failure_reason(&err.message))?;
                        failed += 1;
                    }
                }
            }
        }

        Ok(failed)
    }
}

#[async_trait]
impl<P: NotificationProvider + 'static> DeliveryStrategy for ThrottledDelivery<P> {
    /// Single sends are paced by the caller and skip the rate limiter.
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
        self.deliver_processing(batch).await
    }

    fn supports_batch(&self) -> bool {
        false
    }
}
