//! Delivery strategies: turn aggregates into vendor calls and reconcile the
//! resulting statuses.
//!
//! ```text
//!                 ┌────────────────┐
//!  Notification ─>│ DeliveryRouter │── match Channel
//!  / Batch        └───────┬────────┘
//!          ┌──────────────┼───────────────┐
//!          v              v               v
//!   DirectDelivery  ThrottledDelivery   (system, optional)
//!   vendor batch    chunks of 3, rate
//!   call            limiter, 60s pause
//! ```
//!
//! Every strategy makes at most one vendor attempt per notification per call.
//! Vendor errors are surfaced only after the aggregate status is updated.

mod direct;
mod throttled;

pub use direct::DirectDelivery;
pub use throttled::ThrottledDelivery;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::batch::NotificationBatch;
use crate::config::DeliveryConfig;
use crate::error::{NotificationError, NotificationResult};
use crate::models::Channel;
use crate::notification::Notification;
use crate::providers::{BatchNotificationProvider, NotificationProvider};
use crate::rate_limiter::RateLimiter;

/// Result of a fully successful batch delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Members in the batch.
    pub total: usize,
    /// Members that ended `sent`.
    pub sent: usize,
    /// Vendor round trips the batch was split into.
    pub chunks: usize,
}

/// Channel-specific delivery policy.
#[async_trait]
pub trait DeliveryStrategy: Send + Sync {
    /// Send one pending notification and record the outcome on it.
    async fn deliver_single(&self, notification: &mut Notification) -> NotificationResult<()>;

    /// Process a pending batch and record per-member and batch outcomes.
    ///
    /// Returns `PartialBatchFailure` when some members failed; the members
    /// that went out stay `sent`.
    async fn deliver_batch(&self, batch: &mut NotificationBatch) -> NotificationResult<BatchOutcome>;

    /// Whether the vendor takes a whole batch in one call.
    fn supports_batch(&self) -> bool;
}

/// Reason recorded on a notification when its vendor call fails.
pub(crate) fn failure_reason(message: &str) -> String {
    if message.trim().is_empty() {
        "provider reported an unspecified error".to_string()
    } else {
        message.to_string()
    }
}

/// Send one notification through `provider`, updating its status.
pub(crate) async fn send_single<P>(
    provider: &P,
    notification: &mut Notification,
) -> NotificationResult<()>
where
    P: NotificationProvider + ?Sized,
{
    if !notification.can_be_sent() {
        return Err(NotificationError::CannotSend {
            id: notification.id(),
            status: notification.status().to_string(),
        });
    }

    match provider.send(notification).await {
        Ok(()) => {
            notification.mark_as_sent()?;
            info!(
                notification_id = %notification.id(),
                channel = %notification.channel(),
                provider = provider.name(),
                "Notification sent"
            );
            Ok(())
        }
        Err(err) => {
            warn!(
                notification_id = %notification.id(),
                channel = %notification.channel(),
                provider = provider.name(),
                error = %err,
                "Notification send failed"
            );
            notification.mark_as_failed(failure_reason(&err.message))?;
            Err(err.into())
        }
    }
}

/// Record a batch-level failure after a vendor error aborted processing.
pub(crate) fn abort_batch(
    batch: &mut NotificationBatch,
    reason: String,
) -> NotificationResult<()> {
    let failed = batch.fail_pending_members(&reason)?;
    warn!(
        batch_id = %batch.id(),
        channel = %batch.channel(),
        failed_members = failed,
        reason = %reason,
        "Batch delivery aborted"
    );
    batch.mark_as_failed(reason)
}

/// Close a processed batch: `completed` when nothing failed, otherwise
/// `failed` with a summary and a `PartialBatchFailure` error.
pub(crate) fn finish_batch(
    batch: &mut NotificationBatch,
    failed: usize,
    chunks: usize,
) -> NotificationResult<BatchOutcome> {
    let total = batch.len();
    if failed > 0 {
        batch.mark_as_failed(format!("{failed} of {total} notifications failed"))?;
        warn!(
            batch_id = %batch.id(),
            channel = %batch.channel(),
            failed,
            total,
            "Batch delivered with failures"
        );
        return Err(NotificationError::PartialBatchFailure { failed, total });
    }

    batch.mark_as_completed()?;
    info!(
        batch_id = %batch.id(),
        channel = %batch.channel(),
        total,
        chunks,
        "Batch delivered"
    );
    Ok(BatchOutcome {
        total,
        sent: total,
        chunks,
    })
}

/// Maps each channel to its delivery strategy.
pub struct DeliveryRouter {
    email: Box<dyn DeliveryStrategy>,
    messaging: Box<dyn DeliveryStrategy>,
    system: Option<Box<dyn DeliveryStrategy>>,
}

impl DeliveryRouter {
    pub fn new(
        email: impl DeliveryStrategy + 'static,
        messaging: impl DeliveryStrategy + 'static,
    ) -> Self {
        Self {
            email: Box::new(email),
            messaging: Box::new(messaging),
            system: None,
        }
    }

    /// Standard wiring: direct delivery for email, throttled delivery for
    /// the messaging channel with a fresh rate limiter.
    pub fn standard<E, M>(email: E, messaging: M, config: &DeliveryConfig) -> Self
    where
        E: BatchNotificationProvider + 'static,
        M: NotificationProvider + 'static,
    {
        let limiter = Arc::new(RateLimiter::new(config.rate_limiter));
        Self::new(
            DirectDelivery::new(email),
            ThrottledDelivery::new(messaging, limiter, config.chunking),
        )
    }

    /// Set the strategy for in-app system notifications
    pub fn with_system(mut self, system: impl DeliveryStrategy + 'static) -> Self {
        self.system = Some(Box::new(system));
        self
    }

    pub fn strategy_for(&self, channel: Channel) -> NotificationResult<&dyn DeliveryStrategy> {
        match channel {
            Channel::Email => Ok(self.email.as_ref()),
            Channel::Messaging => Ok(self.messaging.as_ref()),
            Channel::System => self
                .system
                .as_deref()
                .ok_or(NotificationError::UnsupportedChannel(channel)),
        }
    }

    pub async fn deliver_single(&self, notification: &mut Notification) -> NotificationResult<()> {
        self.strategy_for(notification.channel())?
            .deliver_single(notification)
            .await
    }

    pub async fn deliver_batch(&self, batch: &mut NotificationBatch) -> NotificationResult<BatchOutcome> {
        self.strategy_for(batch.channel())?
            .deliver_batch(batch)
            .await
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::tests::{email_notification, messaging_notification};
    use crate::providers::InMemoryProvider;
    use crate::status::NotificationStatus;

    fn router() -> (DeliveryRouter, InMemoryProvider, InMemoryProvider) {
        let email = InMemoryProvider::new();
        let messaging = InMemoryProvider::new();
        let router = DeliveryRouter::standard(
            email.clone(),
            messaging.clone(),
            &DeliveryConfig::default(),
        );
        (router, email, messaging)
    }

    #[test]
    fn test_strategy_selection() {
        let (router, _, _) = router();
        assert!(router.strategy_for(Channel::Email).unwrap().supports_batch());
        assert!(!router.strategy_for(Channel::Messaging).unwrap().supports_batch());
        assert!(matches!(
            router.strategy_for(Channel::System),
            Err(NotificationError::UnsupportedChannel(Channel::System))
        ));
    }

    #[tokio::test]
    async fn test_routes_by_channel() {
        let (router, email, messaging) = router();
        let mut to_email = email_notification();
        let mut to_messaging = messaging_notification();

        router.deliver_single(&mut to_email).await.unwrap();
        router.deliver_single(&mut to_messaging).await.unwrap();

        assert!(email.was_sent(to_email.id()).await);
        assert!(!email.was_sent(to_messaging.id()).await);
        assert!(messaging.was_sent(to_messaging.id()).await);
        assert_eq!(to_messaging.status(), &NotificationStatus::Sent);
    }

    #[tokio::test]
    async fn test_system_strategy_when_configured() {
        let (router, _, _) = router();
        let inbox = InMemoryProvider::new();
        let router = router.with_system(DirectDelivery::new(inbox.clone()));

        let mut notification = Notification::create(
            crate::models::RecipientId::new(),
            crate::models::NotificationContent::new("Maintenance", "Tonight 22:00").unwrap(),
            Channel::System,
            crate::contact::ContactInfo::parse(Channel::System, "user-42").unwrap(),
        )
        .unwrap();

        router.deliver_single(&mut notification).await.unwrap();
        assert!(inbox.was_sent(notification.id()).await);
    }

    #[test]
    fn test_blank_vendor_message_gets_reason() {
        assert_eq!(failure_reason("timeout"), "timeout");
        assert!(!failure_reason("  ").trim().is_empty());
    }
}
