//! Typed payment notifications.
//!
//! The provider posts JSON of the form
//!
//! ```json
//! {
//!   "id": "evt_1",
//!   "type": "payment_succeeded",
//!   "data": {
//!     "session_id": "cs_1",
//!     "payment_id": "pi_1",
//!     "metadata": { "kind": "booking", "domain_id": "…", "requester_id": "…" }
//!   }
//! }
//! ```
//!
//! Only the envelope is parsed here. Metadata stays a string map until the
//! reconciler resolves it, so an unroutable notification can still be
//! flagged under its event id.

use std::collections::BTreeMap;

use marginalia_core::error::DomainError;
use serde::Deserialize;

/// What the provider is reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationType {
    /// Payment captured for a session.
    PaymentSucceeded,
    /// Payment attempt failed for a session.
    PaymentFailed,
    /// Session expired without payment.
    SessionExpired,
    /// Anything else the provider sends.
    Other(String),
}

impl NotificationType {
    fn parse(raw: &str) -> Self {
        match raw {
            "payment_succeeded" => Self::PaymentSucceeded,
            "payment_failed" => Self::PaymentFailed,
            "session_expired" => Self::SessionExpired,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Returns the wire name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::PaymentSucceeded => "payment_succeeded",
            Self::PaymentFailed => "payment_failed",
            Self::SessionExpired => "session_expired",
            Self::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Data,
}

#[derive(Debug, Default, Deserialize)]
struct Data {
    session_id: Option<String>,
    payment_id: Option<String>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

/// A verified notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentNotification {
    /// Provider-assigned id; the idempotency key.
    pub external_event_id: String,
    /// What happened.
    pub notification_type: NotificationType,
    /// The session concerned.
    pub session_id: Option<String>,
    /// Provider payment id, for successful payments.
    pub payment_id: Option<String>,
    /// Metadata echoed from session creation.
    pub metadata: BTreeMap<String, String>,
}

impl PaymentNotification {
    /// Parses a notification body.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the body is not a notification
    /// envelope or the event id is blank.
    pub fn parse(body: &[u8]) -> Result<Self, DomainError> {
        let envelope: Envelope = serde_json::from_slice(body)
            .map_err(|e| DomainError::Validation(format!("malformed notification: {e}")))?;
        if envelope.id.trim().is_empty() {
            return Err(DomainError::Validation("notification id is blank".into()));
        }
        Ok(Self {
            external_event_id: envelope.id,
            notification_type: NotificationType::parse(&envelope.event_type),
            session_id: envelope.data.session_id,
            payment_id: envelope.data.payment_id,
            metadata: envelope.data.metadata,
        })
    }
}
