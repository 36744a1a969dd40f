//! Reconciliation results.

use marginalia_core::model::DomainKind;
use serde::Serialize;
use uuid::Uuid;

/// The state change a notification caused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum Transition {
    /// `pending -> paid`, with every ledger effect of the record.
    MarkedPaid {
        /// Kind of record.
        kind: DomainKind,
        /// The record.
        domain_id: Uuid,
    },
    /// `pending -> cancelled` after the record's last open session failed.
    MarkedCancelled {
        /// Kind of record.
        kind: DomainKind,
        /// The record.
        domain_id: Uuid,
    },
    /// A session failed while another one for the record is still open.
    SessionClosed {
        /// The failed session, when the delivery named one.
        session_id: Option<String>,
    },
}

/// Why a notification changed nothing, without that being a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Already processed, or the record already reached that state.
    Duplicate,
    /// Metadata does not resolve to a record; flagged for review.
    Unroutable,
    /// A notification type the core does not act on.
    Unsupported,
    /// The customer came back before the provider captured payment.
    AwaitingPayment,
}

/// Why a notification was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Signature missing, stale or wrong. Nothing was touched.
    BadSignature,
    /// Payment reported for a cancelled record; flagged for review.
    Inconsistent,
    /// A stock or voucher effect of the order could not be applied; the
    /// whole transition was rolled back and flagged for review.
    LedgerConflict,
    /// The record was already paid through another session; flagged so the
    /// second charge can be refunded.
    DuplicatePayment,
}

/// Result of reconciling one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// State changed.
    Applied(Transition),
    /// Nothing to do.
    Ignored(IgnoreReason),
    /// Refused.
    Rejected(RejectReason),
}
