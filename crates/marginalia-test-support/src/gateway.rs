//! Test gateways: `PaymentGateway` implementations for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use marginalia_core::error::DomainError;
use marginalia_core::gateway::{
    CreateSessionRequest, PaymentGateway, RemotePaymentState, SessionHandle, SessionSnapshot,
};

/// A gateway that records every session it creates, numbering them
/// `cs_test_1`, `cs_test_2`, … Sessions start unpaid; tests move them on with
/// [`RecordingPaymentGateway::mark_paid`] or [`RecordingPaymentGateway::mark_failed`].
#[derive(Debug, Default)]
pub struct RecordingPaymentGateway {
    created: Mutex<Vec<CreateSessionRequest>>,
    snapshots: Mutex<HashMap<String, SessionSnapshot>>,
}

impl RecordingPaymentGateway {
    /// Create a gateway with no sessions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every create request received, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn created_sessions(&self) -> Vec<CreateSessionRequest> {
        self.created.lock().unwrap().clone()
    }

    /// Marks a session as paid with the given provider payment id.
    ///
    /// # Panics
    ///
    /// Panics if the session was never created.
    pub fn mark_paid(&self, session_id: &str, payment_id: &str) {
        let mut snapshots = self.snapshots.lock().unwrap();
        let snapshot = snapshots.get_mut(session_id).expect("unknown session");
        snapshot.state = RemotePaymentState::Paid;
        snapshot.payment_id = Some(payment_id.to_owned());
    }

    /// Marks a session as expired.
    ///
    /// # Panics
    ///
    /// Panics if the session was never created.
    pub fn mark_failed(&self, session_id: &str) {
        let mut snapshots = self.snapshots.lock().unwrap();
        snapshots.get_mut(session_id).expect("unknown session").state = RemotePaymentState::Failed;
    }
}

#[async_trait]
impl PaymentGateway for RecordingPaymentGateway {
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<SessionHandle, DomainError> {
        let mut created = self.created.lock().unwrap();
        created.push(request.clone());
        let session_id = format!("cs_test_{}", created.len());

        self.snapshots.lock().unwrap().insert(
            session_id.clone(),
            SessionSnapshot {
                session_id: session_id.clone(),
                state: RemotePaymentState::Unpaid,
                payment_id: None,
                metadata: request.metadata.to_map(),
            },
        );

        Ok(SessionHandle {
            checkout_url: format!("https://pay.example.test/{session_id}"),
            session_id,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionSnapshot, DomainError> {
        self.snapshots
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("checkout session", session_id))
    }
}

/// A gateway that is always unreachable.
#[derive(Debug)]
pub struct FailingPaymentGateway;

#[async_trait]
impl PaymentGateway for FailingPaymentGateway {
    async fn create_session(
        &self,
        _request: &CreateSessionRequest,
    ) -> Result<SessionHandle, DomainError> {
        Err(DomainError::Infrastructure("payment provider unreachable".into()))
    }

    async fn retrieve_session(&self, _session_id: &str) -> Result<SessionSnapshot, DomainError> {
        Err(DomainError::Infrastructure("payment provider unreachable".into()))
    }
}
