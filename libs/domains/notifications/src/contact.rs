//! Channel-specific contact information.
//!
//! Each contact kind knows how to validate itself for its channel, how to
//! render its canonical form, and compares by that canonical form.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::ValidateEmail;

use crate::error::{NotificationError, NotificationResult};
use crate::models::Channel;

static MESSAGING_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:\-]{0,127}$").unwrap());

/// Capability shared by every contact kind.
pub trait ContactDetails {
    /// Check the value against the channel's rules.
    fn validate(&self) -> NotificationResult<()>;

    /// Canonical string form.
    fn format(&self) -> String;

    /// Compare two contacts by canonical form.
    fn same_contact(&self, other: &Self) -> bool
    where
        Self: Sized,
    {
        self.format() == other.format()
    }
}

/// Email recipient address.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn parse(raw: impl Into<String>) -> NotificationResult<Self> {
        let address = Self(raw.into().trim().to_string());
        address.validate()?;
        Ok(address)
    }

    /// The address as supplied (trimmed, original case).
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ContactDetails for EmailAddress {
    fn validate(&self) -> NotificationResult<()> {
        if self.0.is_empty() || !self.0.validate_email() {
            return Err(NotificationError::Validation(format!(
                "invalid email address: '{}'",
                self.0
            )));
        }
        Ok(())
    }

    fn format(&self) -> String {
        self.0.trim().to_lowercase()
    }
}

impl PartialEq for EmailAddress {
    fn eq(&self, other: &Self) -> bool {
        self.same_contact(other)
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = NotificationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

/// Recipient identifier on the messaging-channel gateway.
///
/// Identifiers are case-sensitive; the canonical form is the trimmed value.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessagingId(String);

impl MessagingId {
    pub fn parse(raw: impl Into<String>) -> NotificationResult<Self> {
        let id = Self(raw.into().trim().to_string());
        id.validate()?;
        Ok(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ContactDetails for MessagingId {
    fn validate(&self) -> NotificationResult<()> {
        if !MESSAGING_ID.is_match(&self.0) {
            return Err(NotificationError::Validation(format!(
                "invalid messaging identifier: '{}'",
                self.0
            )));
        }
        Ok(())
    }

    fn format(&self) -> String {
        self.0.trim().to_string()
    }
}

impl PartialEq for MessagingId {
    fn eq(&self, other: &Self) -> bool {
        self.same_contact(other)
    }
}

impl TryFrom<String> for MessagingId {
    type Error = NotificationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<MessagingId> for String {
    fn from(value: MessagingId) -> Self {
        value.0
    }
}

/// Contact info of a notification recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ContactInfo {
    Email(EmailAddress),
    Messaging(MessagingId),
}

impl ContactInfo {
    /// Parse a raw contact string into the kind the channel uses.
    ///
    /// System notifications address the recipient in-app; an email address is
    /// accepted there when it parses as one, otherwise a messaging identifier.
    pub fn parse(channel: Channel, raw: &str) -> NotificationResult<Self> {
        match channel {
            Channel::Email => Ok(Self::Email(EmailAddress::parse(raw)?)),
            Channel::Messaging => Ok(Self::Messaging(MessagingId::parse(raw)?)),
            Channel::System => EmailAddress::parse(raw)
                .map(Self::Email)
                .or_else(|_| MessagingId::parse(raw).map(Self::Messaging)),
        }
    }
}

impl ContactDetails for ContactInfo {
    fn validate(&self) -> NotificationResult<()> {
        match self {
            Self::Email(address) => address.validate(),
            Self::Messaging(id) => id.validate(),
        }
    }

    fn format(&self) -> String {
        match self {
            Self::Email(address) => address.format(),
            Self::Messaging(id) => id.format(),
        }
    }

    fn same_contact(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Email(a), Self::Email(b)) => a.same_contact(b),
            (Self::Messaging(a), Self::Messaging(b)) => a.same_contact(b),
            _ => false,
        }
    }
}

impl std::fmt::Display for ContactInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_canonical_form() {
        let address = EmailAddress::parse("  Jane.Doe@Example.COM ").unwrap();
        assert_eq!(address.format(), "jane.doe@example.com");
        assert_eq!(address.as_str(), "Jane.Doe@Example.COM");
        assert_eq!(address, EmailAddress::parse("jane.doe@example.com").unwrap());
    }

    #[test]
    fn test_email_rejects_malformed() {
        for raw in ["", "   ", "no-at-sign", "two@@example.com", "@example.com"] {
            let result = EmailAddress::parse(raw);
            assert!(
                matches!(result, Err(NotificationError::Validation(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_messaging_id_rules() {
        let id = MessagingId::parse(" U4af4980629 ").unwrap();
        assert_eq!(id.format(), "U4af4980629");
        assert_ne!(id, MessagingId::parse("u4af4980629").unwrap());

        assert!(MessagingId::parse("").is_err());
        assert!(MessagingId::parse("has space").is_err());
        assert!(MessagingId::parse("-leading-dash").is_err());
        assert!(MessagingId::parse("x".repeat(129)).is_err());
        assert!(MessagingId::parse("x".repeat(128)).is_ok());
    }

    #[test]
    fn test_contact_info_parse_by_channel() {
        assert!(matches!(
            ContactInfo::parse(Channel::Email, "a@example.com"),
            Ok(ContactInfo::Email(_))
        ));
        assert!(ContactInfo::parse(Channel::Email, "U123").is_err());
        assert!(matches!(
            ContactInfo::parse(Channel::Messaging, "U123"),
            Ok(ContactInfo::Messaging(_))
        ));
        assert!(matches!(
            ContactInfo::parse(Channel::System, "a@example.com"),
            Ok(ContactInfo::Email(_))
        ));
        assert!(matches!(
            ContactInfo::parse(Channel::System, "user-42"),
            Ok(ContactInfo::Messaging(_))
        ));
    }

    #[test]
    fn test_contact_kinds_never_equal() {
        let email = ContactInfo::parse(Channel::Email, "a@example.com").unwrap();
        let messaging = ContactInfo::parse(Channel::Messaging, "a.example.com").unwrap();
        assert!(!email.same_contact(&messaging));
        assert!(email.same_contact(&ContactInfo::parse(Channel::Email, "A@EXAMPLE.com").unwrap()));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: ContactInfo =
            serde_json::from_value(serde_json::json!({ "kind": "email", "value": "a@b.io" }))
                .unwrap();
        assert_eq!(ok.format(), "a@b.io");

        let bad = serde_json::from_value::<ContactInfo>(
            serde_json::json!({ "kind": "email", "value": "nope" }),
        );
        assert!(bad.is_err());
    }
}
