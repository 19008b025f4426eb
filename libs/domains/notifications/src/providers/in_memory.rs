//! In-memory provider that records sends, for tests and local wiring.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{BatchNotificationProvider, BatchSendReport, NotificationProvider};
use crate::batch::NotificationBatch;
use crate::contact::{ContactDetails, ContactInfo};
use crate::error::ProviderError;
use crate::models::NotificationId;
use crate::notification::Notification;

#[derive(Debug, Default)]
struct Recorded {
    calls: usize,
    sent: Vec<NotificationId>,
    call_times: Vec<Instant>,
}

/// Provider that keeps every accepted notification in memory.
///
/// Failures are scripted up front: by recipient contact, by call number, or
/// as a total outage of batch sends.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    recorded: Arc<Mutex<Recorded>>,
    fail_contacts: HashMap<String, String>,
    fail_calls: HashMap<usize, String>,
    outage: Option<String>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every send to `contact`.
    ///
    /// Email addresses match case-insensitively, messaging ids exactly.
    pub fn with_failure_for(mut self, contact: impl Into<String>, message: impl Into<String>) -> Self {
        self.fail_contacts
            .insert(contact.into().trim().to_string(), message.into());
        self
    }

    /// Reject the `call`-th single send (1-based).
    pub fn with_failure_on_call(mut self, call: usize, message: impl Into<String>) -> Self {
        self.fail_calls.insert(call, message.into());
        self
    }

    /// Fail every batch send as a whole.
    pub fn with_outage(mut self, message: impl Into<String>) -> Self {
        self.outage = Some(message.into());
        self
    }

    /// Ids of accepted notifications, in send order.
    pub async fn sent(&self) -> Vec<NotificationId> {
        self.recorded.lock().await.sent.clone()
    }

    /// Number of single-send calls made, accepted or not.
    pub async fn call_count(&self) -> usize {
        self.recorded.lock().await.calls
    }

    /// When each single-send call was made.
    pub async fn call_times(&self) -> Vec<Instant> {
        self.recorded.lock().await.call_times.clone()
    }

    pub async fn was_sent(&self, id: NotificationId) -> bool {
        self.recorded.lock().await.sent.contains(&id)
    }

    fn contact_failure(&self, notification: &Notification) -> Option<&String> {
        let contact = notification.contact_info();
        let canonical = contact.format();
        self.fail_contacts
            .iter()
            .find(|(scripted, _)| match contact {
                ContactInfo::Email(_) => scripted.to_lowercase() == canonical,
                ContactInfo::Messaging(_) => **scripted == canonical,
            })
            .map(|(_, message)| message)
    }
}

#[async_trait]
impl NotificationProvider for InMemoryProvider {
    async fn send(&self, notification: &Notification) -> Result<(), ProviderError> {
        let mut recorded = self.recorded.lock().await;
        recorded.calls += 1;
        recorded.call_times.push(Instant::now());

        if let Some(message) = self
            .fail_calls
            .get(&recorded.calls)
            .or_else(|| self.contact_failure(notification))
        {
            return Err(ProviderError::new(message.clone()));
        }

        recorded.sent.push(notification.id());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

#[async_trait]
impl BatchNotificationProvider for InMemoryProvider {
    async fn send_batch(&self, batch: &NotificationBatch) -> Result<BatchSendReport, ProviderError> {
        if let Some(message) = &self.outage {
            return Err(ProviderError::new(message.clone()));
        }

        let mut recorded = self.recorded.lock().await;
        let mut report = BatchSendReport::default();
        for notification in batch.notifications() {
            match self.contact_failure(notification) {
                Some(message) => report.failed.push((notification.id(), message.clone())),
                None => {
                    recorded.sent.push(notification.id());
                    report.succeeded.push(notification.id());
                }
            }
        }
        Ok(report)
    }
}
