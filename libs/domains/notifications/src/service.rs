//! Orchestrating use case: build aggregates, persist them, deliver through
//! the channel strategy, persist the result and publish events.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::batch::NotificationBatch;
use crate::contact::ContactInfo;
use crate::delivery::DeliveryRouter;
use crate::error::{NotificationError, NotificationResult};
use crate::events::NotificationEvent;
use crate::models::{BatchId, Channel, NotificationContent, NotificationId, RecipientId};
use crate::notification::Notification;
use crate::repository::{EventPublisher, NotificationRepository};

/// Request to notify one recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendNotification {
    /// User receiving the notification.
    pub recipient_id: RecipientId,
    /// Title, body and metadata to deliver.
    pub content: NotificationContent,
    /// Delivery channel; selects the strategy.
    pub channel: Channel,
    /// Raw contact, parsed according to `channel`.
    pub contact: String,
}

impl SendNotification {
    fn build(self) -> NotificationResult<Notification> {
        let contact_info = ContactInfo::parse(self.channel, &self.contact)?;
        Notification::create(self.recipient_id, self.content, self.channel, contact_info)
    }
}

/// What the caller gets back from a single send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent(NotificationId),
    /// `notification_id` is `None` when the request never became a notification.
    Failed {
        notification_id: Option<NotificationId>,
        reason: String,
    },
}

impl DispatchOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent(_))
    }
}

/// What the caller gets back from a batch send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchDispatchOutcome {
    /// `None` when the requests were rejected before a batch existed.
    pub batch_id: Option<BatchId>,
    /// Members that ended `sent`.
    pub sent: Vec<NotificationId>,
    /// Members that ended `failed`, with their reason.
    pub failed: Vec<(NotificationId, String)>,
    /// Batch-level failure reason.
    pub error: Option<String>,
}

impl BatchDispatchOutcome {
    fn rejected(batch_id: Option<BatchId>, err: &NotificationError) -> Self {
        Self {
            batch_id,
            error: Some(err.to_string()),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Service layer tying delivery to persistence and the event bus.
pub struct NotificationService<R: NotificationRepository, E: EventPublisher> {
    repository: Arc<R>,
    events: Arc<E>,
    router: Arc<DeliveryRouter>,
}

impl<R: NotificationRepository, E: EventPublisher> NotificationService<R, E> {
    pub fn new(repository: R, events: E, router: DeliveryRouter) -> Self {
        Self {
            repository: Arc::new(repository),
            events: Arc::new(events),
            router: Arc::new(router),
        }
    }

    /// Deliver one notification. Failures come back as a reason, never as an error.
    #[instrument(skip(self, request), fields(channel = %request.channel, recipient_id = %request.recipient_id))]
    pub async fn send(&self, request: SendNotification) -> DispatchOutcome {
        let mut notification = match request.build() {
            Ok(notification) => notification,
            Err(err) => {
                warn!(error = %err, "Rejected notification request");
                return DispatchOutcome::Failed {
                    notification_id: None,
                    reason: err.to_string(),
                };
            }
        };
        let id = notification.id();

        if let Err(err) = self.repository.save(&notification).await {
            error!(notification_id = %id, error = %err, "Failed to save notification");
            return DispatchOutcome::Failed {
                notification_id: Some(id),
                reason: err.to_string(),
            };
        }

        let result = self.router.deliver_single(&mut notification).await;

        if let Err(err) = self.repository.update(&notification).await {
            error!(notification_id = %id, error = %err, "Failed to persist delivery status");
        }
        self.publish_for(std::slice::from_ref(&notification)).await;

        match result {
            Ok(()) => {
                info!(notification_id = %id, "Notification dispatched");
                DispatchOutcome::Sent(id)
            }
            Err(err) => DispatchOutcome::Failed {
                notification_id: Some(id),
                reason: notification
                    .status()
                    .reason()
                    .map(str::to_string)
                    .unwrap_or_else(|| err.to_string()),
            },
        }
    }

    /// Deliver a same-channel group of notifications as one batch.
    #[instrument(skip(self, requests), fields(channel = %channel, size = requests.len()))]
    pub async fn send_batch(
        &self,
        channel: Channel,
        requests: Vec<SendNotification>,
    ) -> BatchDispatchOutcome {
        let notifications = match requests
            .into_iter()
            .map(SendNotification::build)
            .collect::<NotificationResult<Vec<_>>>()
        {
            Ok(notifications) => notifications,
            Err(err) => {
                warn!(error = %err, "Rejected batch request");
                return BatchDispatchOutcome::rejected(None, &err);
            }
        };

        let mut batch = match NotificationBatch::create(channel, notifications) {
            Ok(batch) => batch,
            Err(err) => {
                warn!(error = %err, "Rejected batch request");
                return BatchDispatchOutcome::rejected(None, &err);
            }
        };
        let batch_id = batch.id();

        if let Err(err) = self.repository.save_batch(&batch).await {
            error!(batch_id = %batch_id, error = %err, "Failed to save batch");
            return BatchDispatchOutcome::rejected(Some(batch_id), &err);
        }

        let result = self.router.deliver_batch(&mut batch).await;

        if let Err(err) = self.repository.update_batch(&batch).await {
            error!(batch_id = %batch_id, error = %err, "Failed to persist batch status");
        }
        self.publish_for(batch.notifications()).await;

        let mut outcome = BatchDispatchOutcome {
            batch_id: Some(batch_id),
            ..Default::default()
        };
        for event in batch.notifications().iter().filter_map(NotificationEvent::from_notification) {
            match event {
                NotificationEvent::Sent { id, .. } => outcome.sent.push(id),
                NotificationEvent::Failed { id, reason, .. } => outcome.failed.push((id, reason)),
            }
        }

        match result {
            Ok(delivered) => {
                info!(batch_id = %batch_id, sent = delivered.sent, chunks = delivered.chunks, "Batch dispatched");
            }
            Err(err) => outcome.error = Some(err.to_string()),
        }
        outcome
    }

    /// Publish the post-delivery event of each notification. Failures are logged only.
    async fn publish_for(&self, notifications: &[Notification]) {
        for event in notifications.iter().filter_map(NotificationEvent::from_notification) {
            let id = event.notification_id();
            if let Err(err) = self.events.publish(event).await {
                warn!(notification_id = %id, error = %err, "Failed to publish notification event");
            }
        }
    }
}
