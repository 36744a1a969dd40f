//! Payment collaborator port.
//!
//! The commerce core only needs two calls from the payment provider: create a
//! hosted checkout session, and read a session back when the customer returns
//! from the provider's page.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::model::{DomainKind, MinorUnits};

const KIND_KEY: &str = "kind";
const DOMAIN_ID_KEY: &str = "domain_id";
const REQUESTER_ID_KEY: &str = "requester_id";

/// The link between a payment session and the record it pays for.
///
/// Embedded in the provider session at creation and echoed back on every
/// notification. It is the only routing information the reconciler trusts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Kind of record.
    pub kind: DomainKind,
    /// Record id.
    pub domain_id: Uuid,
    /// Customer the record belongs to.
    pub requester_id: Uuid,
}

impl SessionMetadata {
    /// Flattens the metadata to the string map providers accept.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (KIND_KEY.to_owned(), self.kind.as_str().to_owned()),
            (DOMAIN_ID_KEY.to_owned(), self.domain_id.to_string()),
            (REQUESTER_ID_KEY.to_owned(), self.requester_id.to_string()),
        ])
    }

    /// Parses metadata echoed back by the provider.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Unroutable` if a key is missing or malformed.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, DomainError> {
        let field = |key: &str| {
            map.get(key)
                .map(String::as_str)
                .ok_or_else(|| DomainError::Unroutable(format!("metadata is missing `{key}`")))
        };

        let kind = field(KIND_KEY)?
            .parse::<DomainKind>()
            .map_err(|_| DomainError::Unroutable("metadata `kind` is not booking|order".into()))?;
        let domain_id = Uuid::parse_str(field(DOMAIN_ID_KEY)?)
            .map_err(|e| DomainError::Unroutable(format!("metadata `domain_id`: {e}")))?;
        let requester_id = Uuid::parse_str(field(REQUESTER_ID_KEY)?)
            .map_err(|e| DomainError::Unroutable(format!("metadata `requester_id`: {e}")))?;

        Ok(Self {
            kind,
            domain_id,
            requester_id,
        })
    }
}

/// Request to create a hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateSessionRequest {
    /// Amount to charge.
    pub amount: MinorUnits,
    /// ISO currency code, lower case.
    pub currency: String,
    /// Line description shown to the customer.
    pub description: String,
    /// Email the provider sends the receipt to.
    pub contact_email: String,
    /// Routing metadata.
    pub metadata: SessionMetadata,
}

/// A created session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    /// Provider session id.
    pub session_id: String,
    /// Hosted page the customer is redirected to.
    pub checkout_url: String,
}

/// Payment state of a session as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemotePaymentState {
    /// Customer has not paid yet.
    Unpaid,
    /// Payment captured.
    Paid,
    /// Session expired or payment failed.
    Failed,
}

/// A session read back from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Provider session id.
    pub session_id: String,
    /// Payment state.
    pub state: RemotePaymentState,
    /// Provider payment id, once paid.
    pub payment_id: Option<String>,
    /// Raw metadata as stored on the session.
    pub metadata: BTreeMap<String, String>,
}

/// The payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a hosted checkout session.
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<SessionHandle, DomainError>;

    /// Reads a session back.
    async fn retrieve_session(&self, session_id: &str) -> Result<SessionSnapshot, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_map_round_trip() {
        let metadata = SessionMetadata {
            kind: DomainKind::Order,
            domain_id: Uuid::new_v4(),
            requester_id: Uuid::new_v4(),
        };

        let parsed = SessionMetadata::from_map(&metadata.to_map()).unwrap();

        assert_eq!(parsed, metadata);
    }

    #[test]
    fn test_metadata_missing_key_is_unroutable() {
        let mut map = SessionMetadata {
            kind: DomainKind::Booking,
            domain_id: Uuid::new_v4(),
            requester_id: Uuid::new_v4(),
        }
        .to_map();
        map.remove("domain_id");

        let result = SessionMetadata::from_map(&map);

        match result {
            Err(DomainError::Unroutable(msg)) => assert!(msg.contains("domain_id")),
            other => panic!("expected Unroutable, got {other:?}"),
        }
    }

    #[test]
    fn test_metadata_unknown_kind_is_unroutable() {
        let map = BTreeMap::from([
            ("kind".to_owned(), "subscription".to_owned()),
            ("domain_id".to_owned(), Uuid::new_v4().to_string()),
            ("requester_id".to_owned(), Uuid::new_v4().to_string()),
        ]);

        assert!(matches!(
            SessionMetadata::from_map(&map),
            Err(DomainError::Unroutable(_))
        ));
    }
}
