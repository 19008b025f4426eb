//! The `Notification` aggregate: one message to one recipient on one channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::contact::{ContactDetails, ContactInfo};
use crate::error::{NotificationError, NotificationResult};
use crate::models::{BatchId, Channel, NotificationContent, NotificationId, RecipientId};
use crate::status::NotificationStatus;

/// A single notification and its delivery status.
///
/// Invariants:
/// - `sent_at` is set if and only if the notification went through `sent`.
/// - `batch_id` is only set by a successful batch assignment.
#[derive(Debug, Clone)]
pub struct Notification {
    id: NotificationId,
    recipient_id: RecipientId,
    content: NotificationContent,
    channel: Channel,
    contact_info: ContactInfo,
    status: NotificationStatus,
    created_at: DateTime<Utc>,
    sent_at: Option<DateTime<Utc>>,
    batch_id: Option<BatchId>,
}

/// Persisted shape of a [`Notification`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Notification ID.
    pub id: NotificationId,
    /// Recipient user ID.
    pub recipient_id: RecipientId,
    /// Message payload.
    pub content: NotificationContent,
    /// Delivery channel.
    pub channel: Channel,
    /// Channel-specific contact.
    pub contact_info: ContactInfo,
    /// Status, stored as `status` plus an optional `reason`.
    #[serde(flatten)]
    pub status: NotificationStatus,
    /// When the notification was created.
    pub created_at: DateTime<Utc>,
    /// When the notification was sent, if it was.
    pub sent_at: Option<DateTime<Utc>>,
    /// Owning batch, if assigned.
    pub batch_id: Option<BatchId>,
}

impl Notification {
    /// Create a new pending notification.
    pub fn create(
        recipient_id: RecipientId,
        content: NotificationContent,
        channel: Channel,
        contact_info: ContactInfo,
    ) -> NotificationResult<Self> {
        content.validate()?;
        contact_info.validate()?;
        if !channel.accepts(&contact_info) {
            return Err(NotificationError::ContactChannelMismatch(channel));
        }

        Ok(Self {
            id: NotificationId::new(),
            recipient_id,
            content,
            channel,
            contact_info,
            status: NotificationStatus::Pending,
            created_at: Utc::now(),
            sent_at: None,
            batch_id: None,
        })
    }

    /// Rebuild a notification from persisted parts, re-checking its invariants.
    pub fn restore(record: NotificationRecord) -> NotificationResult<Self> {
        record.content.validate()?;
        record.contact_info.validate()?;
        if !record.channel.accepts(&record.contact_info) {
            return Err(NotificationError::ContactChannelMismatch(record.channel));
        }

        let sent_at_ok = match record.status {
            NotificationStatus::Pending => record.sent_at.is_none(),
            NotificationStatus::Sent | NotificationStatus::Delivered => record.sent_at.is_some(),
            // failed before or after being sent
            NotificationStatus::Failed { .. } => true,
        };
        if !sent_at_ok {
            return Err(NotificationError::Validation(format!(
                "notification {} in status {} has inconsistent sent_at",
                record.id, record.status
            )));
        }

        Ok(Self {
            id: record.id,
            recipient_id: record.recipient_id,
            content: record.content,
            channel: record.channel,
            contact_info: record.contact_info,
            status: record.status,
            created_at: record.created_at,
            sent_at: record.sent_at,
            batch_id: record.batch_id,
        })
    }

    pub fn to_record(&self) -> NotificationRecord {
        NotificationRecord {
            id: self.id,
            recipient_id: self.recipient_id,
            content: self.content.clone(),
            channel: self.channel,
            contact_info: self.contact_info.clone(),
            status: self.status.clone(),
            created_at: self.created_at,
            sent_at: self.sent_at,
            batch_id: self.batch_id,
        }
    }

    pub fn id(&self) -> NotificationId {
        self.id
    }

    pub fn recipient_id(&self) -> RecipientId {
        self.recipient_id
    }

    pub fn content(&self) -> &NotificationContent {
        &self.content
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn contact_info(&self) -> &ContactInfo {
        &self.contact_info
    }

    pub fn status(&self) -> &NotificationStatus {
        &self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.sent_at
    }

    pub fn batch_id(&self) -> Option<BatchId> {
        self.batch_id
    }

    pub fn is_pending(&self) -> bool {
        self.status == NotificationStatus::Pending
    }

    pub fn can_be_sent(&self) -> bool {
        self.is_pending()
    }

    pub fn can_be_assigned_to_batch(&self) -> bool {
        self.is_pending() && self.batch_id.is_none()
    }

    pub fn assign_to_batch(&mut self, batch_id: BatchId) -> NotificationResult<()> {
        if !self.can_be_assigned_to_batch() {
            return Err(NotificationError::CannotAssignToBatch(self.id));
        }
        self.batch_id = Some(batch_id);
        Ok(())
    }

    pub fn mark_as_sent(&mut self) -> NotificationResult<()> {
        if !self.can_be_sent() {
            return Err(NotificationError::CannotSend {
                id: self.id,
                status: self.status.to_string(),
            });
        }
        self.transition(NotificationStatus::Sent)?;
        self.sent_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_as_delivered(&mut self) -> NotificationResult<()> {
        if self.status != NotificationStatus::Sent {
            return Err(NotificationError::NotYetSent(self.id));
        }
        self.transition(NotificationStatus::Delivered)
    }

    /// Fail from `pending` or `sent`. `sent_at` is kept when already sent.
    pub fn mark_as_failed(&mut self, reason: impl Into<String>) -> NotificationResult<()> {
        let failed = NotificationStatus::failed(reason)?;
        self.transition(failed)
    }

    fn transition(&mut self, next: NotificationStatus) -> NotificationResult<()> {
        if !self.status.can_transition_to(&next) {
            return Err(NotificationError::illegal_transition(&self.status, &next));
        }
        self.status = next;
        Ok(())
    }
}

/// Notifications are equal when they share an id.
impl PartialEq for Notification {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Notification {}
