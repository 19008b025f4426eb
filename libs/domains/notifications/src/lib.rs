//! Notifications Domain
//!
//! Delivery core for multi-channel notifications: status state machines, the
//! `Notification` and `NotificationBatch` aggregates, a sliding-window rate
//! limiter and per-channel delivery strategies.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │ NotificationService │  ← Builds aggregates, persists, publishes events
//! └──────────┬──────────┘
//!            │
//! ┌──────────▼──────────┐
//! │   DeliveryRouter    │  ← One strategy per channel
//! └──────────┬──────────┘
//!            │
//!     ┌──────┴───────────────┐
//!     │                      │
//! ┌───▼────────────┐  ┌──────▼────────────┐
//! │ DirectDelivery │  │ ThrottledDelivery │  ← Chunks + RateLimiter
//! └───┬────────────┘  └──────┬────────────┘
//!     │                      │
//! ┌───▼──────────────────────▼───┐
//! │     NotificationProvider     │  ← Email API, messaging gateway, ...
//! └──────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_notifications::{
//!     Channel, DeliveryConfig, DeliveryRouter, NotificationContent, NotificationService,
//!     SendNotification,
//! };
//!
//! let router = DeliveryRouter::standard(email_api, messaging_gateway, &DeliveryConfig::from_env()?);
//! let service = NotificationService::new(repository, event_bus, router);
//!
//! let outcome = service
//!     .send(SendNotification {
//!         recipient_id,
//!         content: NotificationContent::new("Welcome", "Thanks for signing up")?,
//!         channel: Channel::Email,
//!         contact: "user@example.com".to_string(),
//!     })
//!     .await;
//! ```

pub mod batch;
pub mod config;
pub mod contact;
pub mod delivery;
pub mod error;
pub mod events;
pub mod models;
pub mod notification;
pub mod providers;
pub mod rate_limiter;
pub mod repository;
pub mod service;
pub mod status;

// Re-export commonly used types
pub use batch::{BatchRecord, NotificationBatch};
pub use config::{ChunkingConfig, DeliveryConfig, RateLimiterConfig};
pub use contact::{ContactDetails, ContactInfo, EmailAddress, MessagingId};
pub use delivery::{BatchOutcome, DeliveryRouter, DeliveryStrategy, DirectDelivery, ThrottledDelivery};
pub use error::{ErrorCategory, NotificationError, NotificationResult, ProviderError};
pub use events::NotificationEvent;
pub use models::{BatchId, Channel, NotificationContent, NotificationId, RecipientId};
pub use notification::{Notification, NotificationRecord};
pub use providers::{BatchNotificationProvider, BatchSendReport, InMemoryProvider, NotificationProvider};
pub use rate_limiter::RateLimiter;
pub use repository::{EventPublisher, NotificationRepository};
pub use service::{BatchDispatchOutcome, DispatchOutcome, NotificationService, SendNotification};
pub use status::{BatchStatus, NotificationStatus};
