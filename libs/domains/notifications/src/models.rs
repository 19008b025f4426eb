//! Identity and value types shared by the notification aggregates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::contact::ContactInfo;
use crate::error::{NotificationError, NotificationResult};

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new time-ordered identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a single notification.
    NotificationId
);
uuid_id!(
    /// Identifier of a notification batch.
    BatchId
);
uuid_id!(
    /// Identifier of the user receiving a notification.
    RecipientId
);

/// Delivery medium of a notification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Channel {
    /// Email through the email vendor.
    Email,
    /// Messaging-channel gateway (chat app push).
    Messaging,
    /// In-app system notification.
    System,
}

impl Channel {
    /// Key under which outbound calls for this channel are rate limited.
    pub fn rate_limit_key(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Messaging => "messaging",
            Channel::System => "system",
        }
    }

    /// Whether the contact info kind can be used on this channel.
    pub fn accepts(&self, contact: &ContactInfo) -> bool {
        match self {
            Channel::Email => matches!(contact, ContactInfo::Email(_)),
            Channel::Messaging => matches!(contact, ContactInfo::Messaging(_)),
            Channel::System => true,
        }
    }
}

/// Message payload of a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationContent {
    /// Short headline (email subject, push title).
    pub title: String,
    /// Message text, never blank.
    pub body: String,
    /// Free-form data passed through to the vendor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl NotificationContent {
    /// Create content without metadata. The body must not be blank.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> NotificationResult<Self> {
        let content = Self {
            title: title.into(),
            body: body.into(),
            metadata: None,
        };
        content.validate()?;
        Ok(content)
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }

    pub fn validate(&self) -> NotificationResult<()> {
        if self.body.trim().is_empty() {
            return Err(NotificationError::Validation(
                "notification body must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
