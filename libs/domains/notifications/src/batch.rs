//! The `NotificationBatch` aggregate: a same-channel group of notifications
//! processed under one status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{NotificationError, NotificationResult};
use crate::models::{BatchId, Channel};
use crate::notification::{Notification, NotificationRecord};
use crate::status::{BatchStatus, NotificationStatus};

/// A batch of notifications sharing one channel.
///
/// Invariants, checked at construction and before processing starts:
/// - at least one member
/// - every member uses the batch channel
/// - while the batch is `pending`, every member is `pending`
///
/// Member statuses are updated by the delivery strategy independently of the
/// batch status, so a `failed` batch may still contain `sent` members.
#[derive(Debug, Clone)]
pub struct NotificationBatch {
    id: BatchId,
    channel: Channel,
    notifications: Vec<Notification>,
    status: BatchStatus,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

/// Persisted shape of a [`NotificationBatch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    /// Batch ID.
    pub id: BatchId,
    /// Channel shared by every member.
    pub channel: Channel,
    /// Members in batch order.
    pub notifications: Vec<NotificationRecord>,
    /// Status, stored as `status` plus an optional `reason`.
    #[serde(flatten)]
    pub status: BatchStatus,
    /// When the batch was created.
    pub created_at: DateTime<Utc>,
    /// When the batch reached a terminal status.
    pub processed_at: Option<DateTime<Utc>>,
}

impl NotificationBatch {
    /// Group pending, unassigned notifications into a new batch.
    ///
    /// Every notification is checked before any is assigned, so on error no
    /// member has been touched.
    pub fn create(channel: Channel, mut notifications: Vec<Notification>) -> NotificationResult<Self> {
        if notifications.is_empty() {
            return Err(NotificationError::EmptyBatch);
        }

        for notification in &notifications {
            if !notification.can_be_assigned_to_batch() {
                return Err(NotificationError::CannotAssignToBatch(notification.id()));
            }
        }

        let batch_id = BatchId::new();
        let batch = Self {
            id: batch_id,
            channel,
            notifications: Vec::new(),
            status: BatchStatus::Pending,
            created_at: Utc::now(),
            processed_at: None,
        };
        Self::check_members(channel, &batch.status, &notifications)?;

        for notification in &mut notifications {
            notification.assign_to_batch(batch_id)?;
        }

        Ok(Self {
            notifications,
            ..batch
        })
    }

    /// Rebuild a batch from persisted parts, re-checking every invariant.
    pub fn restore(record: BatchRecord) -> NotificationResult<Self> {
        if record.notifications.is_empty() {
            return Err(NotificationError::EmptyBatch);
        }

        let notifications = record
            .notifications
            .into_iter()
            .map(Notification::restore)
            .collect::<NotificationResult<Vec<_>>>()?;

        Self::check_members(record.channel, &record.status, &notifications)?;

        if let Some(stray) = notifications
            .iter()
            .find(|n| n.batch_id() != Some(record.id))
        {
            return Err(NotificationError::BatchInvariantViolation(format!(
                "notification {} does not reference batch {}",
                stray.id(),
                record.id
            )));
        }

        if record.status.is_terminal() != record.processed_at.is_some() {
            return Err(NotificationError::BatchInvariantViolation(format!(
                "batch {} in status {} has inconsistent processed_at",
                record.id, record.status
            )));
        }

        Ok(Self {
            id: record.id,
            channel: record.channel,
            notifications,
            status: record.status,
            created_at: record.created_at,
            processed_at: record.processed_at,
        })
    }

    pub fn to_record(&self) -> BatchRecord {
        BatchRecord {
            id: self.id,
            channel: self.channel,
            notifications: self.notifications.iter().map(Notification::to_record).collect(),
            status: self.status.clone(),
            created_at: self.created_at,
            processed_at: self.processed_at,
        }
    }

    fn check_members(
        channel: Channel,
        status: &BatchStatus,
        notifications: &[Notification],
    ) -> NotificationResult<()> {
        if let Some(n) = notifications.iter().find(|n| n.channel() != channel) {
            return Err(NotificationError::BatchInvariantViolation(format!(
                "notification {} uses channel {} but batch uses {}",
                n.id(),
                n.channel(),
                channel
            )));
        }

        if *status == BatchStatus::Pending {
            if let Some(n) = notifications.iter().find(|n| !n.is_pending()) {
                return Err(NotificationError::BatchInvariantViolation(format!(
                    "pending batch contains notification {} in status {}",
                    n.id(),
                    n.status()
                )));
            }
        }

        Ok(())
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn status(&self) -> &BatchStatus {
        &self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn processed_at(&self) -> Option<DateTime<Utc>> {
        self.processed_at
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub(crate) fn notifications_mut(&mut self) -> &mut [Notification] {
        &mut self.notifications
    }

    pub fn into_notifications(self) -> Vec<Notification> {
        self.notifications
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    /// Number of members whose status satisfies `predicate`.
    pub fn count_where(&self, predicate: impl Fn(&NotificationStatus) -> bool) -> usize {
        self.notifications
            .iter()
            .filter(|n| predicate(n.status()))
            .count()
    }

    pub fn can_add_notification(&self, notification: &Notification) -> bool {
        self.status == BatchStatus::Pending
            && notification.can_be_assigned_to_batch()
            && notification.channel() == self.channel
    }

    pub fn add_notification(&mut self, mut notification: Notification) -> NotificationResult<()> {
        if !self.can_add_notification(&notification) {
            return Err(NotificationError::CannotAddToBatch {
                batch_id: self.id,
                notification_id: notification.id(),
            });
        }
        notification.assign_to_batch(self.id)?;
        self.notifications.push(notification);
        Ok(())
    }

    pub fn can_be_processed(&self) -> bool {
        self.status == BatchStatus::Pending
    }

    pub fn start_processing(&mut self) -> NotificationResult<()> {
        if !self.can_be_processed() {
            return Err(NotificationError::CannotProcess {
                id: self.id,
                status: self.status.to_string(),
            });
        }
        Self::check_members(self.channel, &self.status, &self.notifications)?;
        self.transition(BatchStatus::Processing)
    }

    pub fn mark_as_completed(&mut self) -> NotificationResult<()> {
        if self.status != BatchStatus::Processing {
            return Err(NotificationError::NotProcessing(self.id));
        }
        self.transition(BatchStatus::Completed)?;
        self.processed_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_as_failed(&mut self, reason: impl Into<String>) -> NotificationResult<()> {
        let failed = BatchStatus::failed(reason)?;
        self.transition(failed)?;
        self.processed_at = Some(Utc::now());
        Ok(())
    }

    /// Fail every member that is still pending. Returns how many were failed.
    pub(crate) fn fail_pending_members(&mut self, reason: &str) -> NotificationResult<usize> {
        let mut failed = 0;
        for notification in self
            .notifications
            .iter_mut()
            .filter(|n| *n.status() == NotificationStatus::Pending)
        {
            notification.mark_as_failed(reason)?;
            failed += 1;
        }
        Ok(failed)
    }

    fn transition(&mut self, next: BatchStatus) -> NotificationResult<()> {
        if !self.status.can_transition_to(&next) {
            return Err(NotificationError::illegal_transition(&self.status, &next));
        }
        self.status = next;
        Ok(())
    }
}
