//! Per-record payment state machine.
//!
//! ```text
//! pending --(payment confirmed)--> paid       [terminal]
//! pending --(last session failed)--> cancelled [terminal]
//! ```

use marginalia_core::model::{RecordStatus, SessionStatus};

/// What a payment confirmation does to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaidStep {
    /// Move to `paid` and apply effects.
    MarkPaid,
    /// Already paid through another delivery.
    AlreadyPaid,
    /// Paid money for a cancelled record.
    Inconsistent,
}

/// The session a confirmation for an already-paid record names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportedSession {
    /// The delivery names no session.
    Unnamed,
    /// Named, but never recorded against the record.
    Unrecorded,
    /// A recorded session in the given status.
    Recorded(SessionStatus),
}

/// What a second payment confirmation for a paid record is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatStep {
    /// The payment that settled the record, delivered again.
    Replay,
    /// Money taken through another session; needs a refund.
    SecondCharge,
}

/// What a failed or expired session does to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStep {
    /// No other session can still pay: move to `cancelled`.
    Cancel,
    /// Another session is still open: only close this one.
    CloseSession,
    /// The record already settled.
    AlreadySettled,
}

/// Decides the step for a payment confirmation.
#[must_use]
pub fn on_paid(status: RecordStatus) -> PaidStep {
    match status {
        RecordStatus::Pending => PaidStep::MarkPaid,
        RecordStatus::Paid => PaidStep::AlreadyPaid,
        RecordStatus::Cancelled => PaidStep::Inconsistent,
    }
}

/// Tells a replayed confirmation from a second charge. The settling session
/// is marked complete, so any other named session took money again.
#[must_use]
pub fn on_paid_again(reported: ReportedSession, same_payment_id: bool) -> RepeatStep {
    match reported {
        _ if same_payment_id => RepeatStep::Replay,
        ReportedSession::Unnamed | ReportedSession::Recorded(SessionStatus::Complete) => {
            RepeatStep::Replay
        }
        ReportedSession::Unrecorded
        | ReportedSession::Recorded(SessionStatus::Open | SessionStatus::Expired) => {
            RepeatStep::SecondCharge
        }
    }
}

/// Decides the step for a failed session given how many other sessions for
/// the record are still open.
#[must_use]
pub fn on_failed(status: RecordStatus, other_open_sessions: i64) -> FailedStep {
    match status {
        RecordStatus::Pending if other_open_sessions == 0 => FailedStep::Cancel,
        RecordStatus::Pending => FailedStep::CloseSession,
        RecordStatus::Paid | RecordStatus::Cancelled => FailedStep::AlreadySettled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paid_transitions() {
        assert_eq!(on_paid(RecordStatus::Pending), PaidStep::MarkPaid);
        assert_eq!(on_paid(RecordStatus::Paid), PaidStep::AlreadyPaid);
        assert_eq!(on_paid(RecordStatus::Cancelled), PaidStep::Inconsistent);
    }

    #[test]
    fn test_paid_again_through_settling_session_is_replay() {
        assert_eq!(
            on_paid_again(ReportedSession::Recorded(SessionStatus::Complete), false),
            RepeatStep::Replay
        );
        assert_eq!(on_paid_again(ReportedSession::Unnamed, false), RepeatStep::Replay);
        assert_eq!(on_paid_again(ReportedSession::Unrecorded, true), RepeatStep::Replay);
    }

    #[test]
    fn test_paid_again_through_other_session_is_second_charge() {
        assert_eq!(
            on_paid_again(ReportedSession::Recorded(SessionStatus::Open), false),
            RepeatStep::SecondCharge
        );
        assert_eq!(
            on_paid_again(ReportedSession::Recorded(SessionStatus::Expired), false),
            RepeatStep::SecondCharge
        );
        assert_eq!(
            on_paid_again(ReportedSession::Unrecorded, false),
            RepeatStep::SecondCharge
        );
    }

    #[test]
    fn test_failure_cancels_only_without_other_open_sessions() {
        assert_eq!(on_failed(RecordStatus::Pending, 0), FailedStep::Cancel);
        assert_eq!(on_failed(RecordStatus::Pending, 1), FailedStep::CloseSession);
        assert_eq!(on_failed(RecordStatus::Paid, 0), FailedStep::AlreadySettled);
    }
}
