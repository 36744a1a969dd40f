//! Shared application state.

use std::sync::Arc;

use marginalia_core::clock::SharedClock;
use marginalia_core::codes::CodeGenerator;
use marginalia_core::gateway::PaymentGateway;
use marginalia_core::store::CommerceStore;
use marginalia_payments::application::command_handlers::ReconcileContext;
use marginalia_payments::domain::signature::WebhookVerifier;

use crate::auth::StaffTokens;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Transactional store.
    pub store: Arc<dyn CommerceStore>,
    /// Payment provider client.
    pub gateway: Arc<dyn PaymentGateway>,
    /// Clock for timestamps and expiry checks.
    pub clock: SharedClock,
    /// Voucher code source.
    pub codes: Arc<dyn CodeGenerator>,
    /// Checks payment notification signatures.
    pub verifier: WebhookVerifier,
    /// Bearer tokens for staff roles.
    pub staff_tokens: StaffTokens,
    /// Currency used when a checkout request names none.
    pub currency: String,
    /// Lifetime of vouchers bought in an order.
    pub voucher_validity: chrono::Duration,
}

impl AppState {
    /// Borrows the collaborators the reconciler needs.
    #[must_use]
    pub fn reconcile_context(&self) -> ReconcileContext<'_> {
        ReconcileContext {
            clock: self.clock.as_ref(),
            codes: self.codes.as_ref(),
            store: self.store.as_ref(),
            voucher_validity: self.voucher_validity,
        }
    }
}
