//! Status state machines for notifications and batches.
//!
//! ```text
//! Notification:                         Batch:
//!
//! pending ──> sent ──> delivered        pending ──> processing ──> completed
//!    │         │                           │            │
//!    └────┬────┘                           └─────┬──────┘
//!         v                                      v
//!      failed(reason)                       failed(reason)
//! ```
//!
//! `can_transition_to` is a pure query. The owning aggregate checks it before
//! assigning a new status and reports `IllegalTransition` otherwise.

use serde::{Deserialize, Serialize};

use crate::error::{NotificationError, NotificationResult};

fn require_reason(reason: impl Into<String>) -> NotificationResult<String> {
    let reason = reason.into();
    if reason.trim().is_empty() {
        return Err(NotificationError::MissingReason);
    }
    Ok(reason)
}

/// Lifecycle status of a single notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Delivered,
    Failed { reason: String },
}

impl NotificationStatus {
    /// Build a failed status. Blank reasons are rejected.
    pub fn failed(reason: impl Into<String>) -> NotificationResult<Self> {
        Ok(Self::Failed {
            reason: require_reason(reason)?,
        })
    }

    /// Build a status from its raw persisted parts.
    pub fn parse(value: &str, reason: Option<&str>) -> NotificationResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "delivered" => Ok(Self::Delivered),
            "failed" => Self::failed(reason.ok_or(NotificationError::MissingReason)?),
            _ => Err(NotificationError::InvalidStatus(value.to_string())),
        }
    }

    pub fn can_transition_to(&self, candidate: &NotificationStatus) -> bool {
        matches!(
            (self, candidate),
            (Self::Pending, Self::Sent)
                | (Self::Pending, Self::Failed { .. })
                | (Self::Sent, Self::Delivered)
                | (Self::Sent, Self::Failed { .. })
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Failed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Failed { .. } => "failed",
        }
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a notification batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Failed { reason: String },
}

impl BatchStatus {
    /// Build a failed status. Blank reasons are rejected.
    pub fn failed(reason: impl Into<String>) -> NotificationResult<Self> {
        Ok(Self::Failed {
            reason: require_reason(reason)?,
        })
    }

    /// Build a status from its raw persisted parts.
    pub fn parse(value: &str, reason: Option<&str>) -> NotificationResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Self::failed(reason.ok_or(NotificationError::MissingReason)?),
            _ => Err(NotificationError::InvalidStatus(value.to_string())),
        }
    }

    pub fn can_transition_to(&self, candidate: &BatchStatus) -> bool {
        matches!(
            (self, candidate),
            (Self::Pending, Self::Processing)
                | (Self::Pending, Self::Failed { .. })
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed { .. })
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
