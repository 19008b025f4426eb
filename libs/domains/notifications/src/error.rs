//! Error types for the notification delivery core.

use thiserror::Error;

use crate::models::{BatchId, Channel, NotificationId};

/// Result type for notification operations.
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Broad class of a [`NotificationError`].
///
/// None of these are retried inside the core; the category only tells the
/// caller what kind of failure it is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed input (contact info, empty batch, bad raw status).
    Validation,
    /// Illegal status change or ineligible batch membership.
    State,
    /// The vendor rejected or failed some or all deliveries.
    Delivery,
    /// Persistence, event bus or configuration problems.
    Infrastructure,
}

/// Error reported by a channel vendor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    /// Vendor-supplied failure message.
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors that can occur in the notifications domain.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Raw status value is not a recognised variant.
    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    /// A failed status was requested without a reason.
    #[error("Failed status requires a reason")]
    MissingReason,

    /// Status change not allowed by the state machine.
    #[error("Illegal status transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    /// Malformed input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Contact info kind does not fit the notification channel.
    #[error("Contact info is not usable for channel {0}")]
    ContactChannelMismatch(Channel),

    /// Notification is not pending and cannot be sent.
    #[error("Notification {id} cannot be sent in status {status}")]
    CannotSend { id: NotificationId, status: String },

    /// Delivery confirmation for a notification that was never sent.
    #[error("Notification {0} has not been sent yet")]
    NotYetSent(NotificationId),

    /// Notification is not pending or already belongs to a batch.
    #[error("Notification {0} cannot be assigned to a batch")]
    CannotAssignToBatch(NotificationId),

    /// Batches need at least one notification.
    #[error("Batch must contain at least one notification")]
    EmptyBatch,

    /// Notification cannot join this batch.
    #[error("Notification {notification_id} cannot be added to batch {batch_id}")]
    CannotAddToBatch {
        batch_id: BatchId,
        notification_id: NotificationId,
    },

    /// Batch is not pending and cannot start processing.
    #[error("Batch {id} cannot be processed in status {status}")]
    CannotProcess { id: BatchId, status: String },

    /// Batch completion requested outside of processing.
    #[error("Batch {0} is not processing")]
    NotProcessing(BatchId),

    /// Batch membership rules are broken.
    #[error("Batch invariant violated: {0}")]
    BatchInvariantViolation(String),

    /// Some members of a batch could not be delivered.
    #[error("{failed} of {total} notifications in batch failed")]
    PartialBatchFailure { failed: usize, total: usize },

    /// No delivery strategy is configured for the channel.
    #[error("No delivery strategy configured for channel {0}")]
    UnsupportedChannel(Channel),

    /// Vendor failure.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Persistence collaborator failure.
    #[error("Repository error: {0}")]
    Repository(String),

    /// Event bus failure.
    #[error("Event publish error: {0}")]
    EventPublish(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl NotificationError {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidStatus(_)
            | Self::MissingReason
            | Self::Validation(_)
            | Self::ContactChannelMismatch(_)
            | Self::EmptyBatch => ErrorCategory::Validation,
            Self::IllegalTransition { .. }
            | Self::CannotSend { .. }
            | Self::NotYetSent(_)
            | Self::CannotAssignToBatch(_)
            | Self::CannotAddToBatch { .. }
            | Self::CannotProcess { .. }
            | Self::NotProcessing(_)
            | Self::BatchInvariantViolation(_)
            | Self::UnsupportedChannel(_) => ErrorCategory::State,
            Self::PartialBatchFailure { .. } | Self::Provider(_) => ErrorCategory::Delivery,
            Self::Repository(_) | Self::EventPublish(_) | Self::Config(_) => {
                ErrorCategory::Infrastructure
            }
        }
    }

    pub(crate) fn illegal_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::IllegalTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
