//! Domain events emitted after a delivery attempt.

use serde::{Deserialize, Serialize};

use crate::models::{Channel, NotificationId, RecipientId};
use crate::notification::Notification;
use crate::status::NotificationStatus;

/// Outcome of a delivery attempt, published once per notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// The vendor accepted the notification.
    Sent {
        id: NotificationId,
        recipient_id: RecipientId,
        channel: Channel,
    },
    /// Delivery failed; `reason` is the recorded failure reason.
    Failed {
        id: NotificationId,
        recipient_id: RecipientId,
        channel: Channel,
        reason: String,
    },
}

impl NotificationEvent {
    /// Event describing where a notification ended up, or `None` while it is
    /// still pending.
    pub fn from_notification(notification: &Notification) -> Option<Self> {
        let id = notification.id();
        let recipient_id = notification.recipient_id();
        let channel = notification.channel();

        match notification.status() {
            NotificationStatus::Pending => None,
            NotificationStatus::Sent | NotificationStatus::Delivered => Some(Self::Sent {
                id,
                recipient_id,
                channel,
            }),
            NotificationStatus::Failed { reason } => Some(Self::Failed {
                id,
                recipient_id,
                channel,
                reason: reason.clone(),
            }),
        }
    }

    pub fn notification_id(&self) -> NotificationId {
        match self {
            Self::Sent { id, .. } | Self::Failed { id, .. } => *id,
        }
    }
}
