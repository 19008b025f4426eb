//! End-to-end delivery scenarios for the notifications domain
//!
//! These tests drive the public API only:
//! - Aggregates and their state machines
//! - Channel strategies behind `DeliveryRouter`
//! - `NotificationService` with in-memory persistence and event bus
//!
//! Time-dependent cases run on tokio's paused clock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain_notifications::*;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Clone, Default)]
struct InMemoryStore {
    notifications: Arc<Mutex<HashMap<NotificationId, NotificationRecord>>>,
    batches: Arc<Mutex<HashMap<BatchId, BatchRecord>>>,
}

impl InMemoryStore {
    async fn notification(&self, id: NotificationId) -> Option<NotificationRecord> {
        self.notifications.lock().await.get(&id).cloned()
    }

    async fn batch(&self, id: BatchId) -> Option<BatchRecord> {
        self.batches.lock().await.get(&id).cloned()
    }
}

#[async_trait]
impl NotificationRepository for InMemoryStore {
    async fn save(&self, notification: &Notification) -> NotificationResult<()> {
        self.notifications
            .lock()
            .await
            .insert(notification.id(), notification.to_record());
        Ok(())
    }

    async fn update(&self, notification: &Notification) -> NotificationResult<()> {
        self.save(notification).await
    }

    async fn save_batch(&self, batch: &NotificationBatch) -> NotificationResult<()> {
        self.batches.lock().await.insert(batch.id(), batch.to_record());
        Ok(())
    }

    async fn update_batch(&self, batch: &NotificationBatch) -> NotificationResult<()> {
        self.save_batch(batch).await
    }
}

#[derive(Clone, Default)]
struct RecordingBus {
    events: Arc<Mutex<Vec<NotificationEvent>>>,
}

#[async_trait]
impl EventPublisher for RecordingBus {
    async fn publish(&self, event: NotificationEvent) -> NotificationResult<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

struct Harness {
    service: NotificationService<InMemoryStore, RecordingBus>,
    store: InMemoryStore,
    bus: RecordingBus,
    email: InMemoryProvider,
    messaging: InMemoryProvider,
}

fn harness(email: InMemoryProvider, messaging: InMemoryProvider) -> Harness {
    let store = InMemoryStore::default();
    let bus = RecordingBus::default();
    let router = DeliveryRouter::standard(email.clone(), messaging.clone(), &DeliveryConfig::default());
    Harness {
        service: NotificationService::new(store.clone(), bus.clone(), router),
        store,
        bus,
        email,
        messaging,
    }
}

fn request(channel: Channel, contact: &str) -> SendNotification {
    SendNotification {
        recipient_id: RecipientId::new(),
        content: NotificationContent::new("Appointment", "See you on Friday at 10:00").unwrap(),
        channel,
        contact: contact.to_string(),
    }
}

fn messaging_requests(count: usize) -> Vec<SendNotification> {
    (0..count)
        .map(|i| request(Channel::Messaging, &format!("U{i:010}")))
        .collect()
}

#[tokio::test]
async fn test_single_email_is_sent_and_persisted() {
    let h = harness(InMemoryProvider::new(), InMemoryProvider::new());

    let outcome = h.service.send(request(Channel::Email, "patient@clinic.example")).await;

    let DispatchOutcome::Sent(id) = outcome else {
        panic!("expected sent, got {outcome:?}");
    };
    let record = h.store.notification(id).await.unwrap();
    assert_eq!(record.status, NotificationStatus::Sent);
    assert!(record.sent_at.is_some());
    assert!(h.email.was_sent(id).await);
    assert_eq!(h.bus.events.lock().await.len(), 1);
}

#[tokio::test]
async fn test_single_failure_returns_reason_and_persists_failed() {
    let email = InMemoryProvider::new().with_failure_for("patient@clinic.example", "recipient blocked");
    let h = harness(email, InMemoryProvider::new());

    let outcome = h.service.send(request(Channel::Email, "patient@clinic.example")).await;

    let DispatchOutcome::Failed {
        notification_id: Some(id),
        reason,
    } = outcome
    else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(reason, "recipient blocked");
    let record = h.store.notification(id).await.unwrap();
    assert_eq!(record.status.reason(), Some("recipient blocked"));
    assert!(record.sent_at.is_none());
    assert!(matches!(
        h.bus.events.lock().await.as_slice(),
        [NotificationEvent::Failed { .. }]
    ));
}

#[tokio::test(start_paused = true)]
async fn test_three_messaging_notifications_one_chunk() {
    let h = harness(InMemoryProvider::new(), InMemoryProvider::new());
    let start = Instant::now();

    let outcome = h.service.send_batch(Channel::Messaging, messaging_requests(3)).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.sent.len(), 3);
    assert_eq!(start.elapsed(), Duration::ZERO);
    let batch = h.store.batch(outcome.batch_id.unwrap()).await.unwrap();
    assert_eq!(batch.status, BatchStatus::Completed);
    assert!(batch.processed_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_five_messaging_notifications_two_chunks() {
    let h = harness(InMemoryProvider::new(), InMemoryProvider::new());
    let start = Instant::now();

    let outcome = h.service.send_batch(Channel::Messaging, messaging_requests(5)).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.sent.len(), 5);
    assert_eq!(start.elapsed(), Duration::from_secs(60));
    assert_eq!(h.messaging.call_count().await, 5);
}

#[tokio::test(start_paused = true)]
async fn test_second_vendor_call_fails() {
    let messaging = InMemoryProvider::new().with_failure_on_call(2, "gateway timeout");
    let h = harness(InMemoryProvider::new(), messaging);

    let outcome = h.service.send_batch(Channel::Messaging, messaging_requests(3)).await;

    assert_eq!(outcome.error.as_deref(), Some("1 of 3 notifications in batch failed"));
    let batch = h.store.batch(outcome.batch_id.unwrap()).await.unwrap();
    let statuses: Vec<_> = batch.notifications.iter().map(|n| n.status.clone()).collect();
    assert_eq!(
        statuses,
        vec![
            NotificationStatus::Sent,
            NotificationStatus::Failed {
                reason: "gateway timeout".into()
            },
            NotificationStatus::Sent,
        ]
    );
    // Members that went out stay sent under a failed batch.
    assert_eq!(batch.status.as_str(), "failed");
    assert_eq!(h.bus.events.lock().await.len(), 3);
}

#[tokio::test]
async fn test_email_batch_outage() {
    let email = InMemoryProvider::new().with_outage("503 service unavailable");
    let h = harness(email, InMemoryProvider::new());

    let outcome = h
        .service
        .send_batch(
            Channel::Email,
            vec![
                request(Channel::Email, "a@clinic.example"),
                request(Channel::Email, "b@clinic.example"),
            ],
        )
        .await;

    assert!(outcome.sent.is_empty());
    assert_eq!(outcome.failed.len(), 2);
    assert!(outcome.error.unwrap().contains("503 service unavailable"));
}

#[tokio::test]
async fn test_sent_notification_cannot_join_batch() {
    let router = DeliveryRouter::standard(
        InMemoryProvider::new(),
        InMemoryProvider::new(),
        &DeliveryConfig::default(),
    );
    let contact = ContactInfo::parse(Channel::Email, "a@clinic.example").unwrap();
    let content = NotificationContent::new("Reminder", "Bring your card").unwrap();

    let mut sent = Notification::create(RecipientId::new(), content.clone(), Channel::Email, contact.clone()).unwrap();
    router.deliver_single(&mut sent).await.unwrap();

    let pending = Notification::create(RecipientId::new(), content, Channel::Email, contact).unwrap();
    let mut batch = NotificationBatch::create(Channel::Email, vec![pending]).unwrap();

    let err = sent.assign_to_batch(batch.id()).unwrap_err();
    assert!(matches!(err, NotificationError::CannotAssignToBatch(_)));
    assert!(batch.add_notification(sent).is_err());
    assert_eq!(batch.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limiter_eleventh_call_waits_for_window() {
    let limiter = RateLimiter::new(RateLimiterConfig::default());
    let start = Instant::now();

    for _ in 0..10 {
        limiter.check_and_wait_if_needed("messaging").await;
    }
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(limiter.remaining_requests("messaging"), 0);

    limiter.check_and_wait_if_needed("messaging").await;
    assert_eq!(start.elapsed(), Duration::from_millis(60_000));
}

#[test]
fn test_records_survive_serialization() {
    let contact = ContactInfo::parse(Channel::Messaging, "U4af4980629").unwrap();
    let mut notification = Notification::create(
        RecipientId::new(),
        NotificationContent::new("Ping", "Pong").unwrap(),
        Channel::Messaging,
        contact,
    )
    .unwrap();
    notification.mark_as_failed("invalid token").unwrap();

    let json = serde_json::to_string(&notification.to_record()).unwrap();
    let restored = Notification::restore(serde_json::from_str(&json).unwrap()).unwrap();

    assert_eq!(restored.id(), notification.id());
    assert_eq!(restored.status().reason(), Some("invalid token"));
}
