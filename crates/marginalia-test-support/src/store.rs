//! Test stores: `CommerceStore` implementations for tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marginalia_core::error::DomainError;
use marginalia_core::model::{
    BookingRecord, CheckoutSessionRecord, DomainKind, EventRecord, FlaggedPaymentEvent,
    OrderLine, OrderRecord, ProcessedPaymentEvent, RecordStatus, SessionStatus, StockMovement,
    VoucherRecord, VoucherRedemption, VoucherStatus,
};
use marginalia_core::store::{CommerceStore, UnitOfWork};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Everything the in-memory store holds. Public so tests can seed and
/// inspect it directly.
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    /// Events by id.
    pub events: HashMap<Uuid, EventRecord>,
    /// Bookings in admission order.
    pub bookings: Vec<BookingRecord>,
    /// Orders with their lines, by id.
    pub orders: HashMap<Uuid, (OrderRecord, Vec<OrderLine>)>,
    /// Sessions in issue order.
    pub sessions: Vec<CheckoutSessionRecord>,
    /// Consumed notifications.
    pub processed_events: Vec<ProcessedPaymentEvent>,
    /// Notifications awaiting operator review.
    pub flagged_events: Vec<FlaggedPaymentEvent>,
    /// Vouchers in issue order.
    pub vouchers: Vec<VoucherRecord>,
    /// Applied redemptions.
    pub redemptions: Vec<VoucherRedemption>,
    /// Stored stock counters.
    pub stock_levels: HashMap<Uuid, i64>,
    /// The append-only stock log.
    pub stock_movements: Vec<StockMovement>,
}

impl StoreState {
    fn booking_mut(&mut self, booking_id: Uuid) -> Result<&mut BookingRecord, DomainError> {
        self.bookings
            .iter_mut()
            .find(|b| b.id == booking_id)
            .ok_or_else(|| DomainError::not_found("booking", booking_id))
    }

    fn session_mut(&mut self, session_id: &str) -> Result<&mut CheckoutSessionRecord, DomainError> {
        self.sessions
            .iter_mut()
            .find(|s| s.session_id == session_id)
            .ok_or_else(|| DomainError::not_found("checkout session", session_id))
    }
}

/// A serializable in-memory store.
///
/// Each unit of work holds the whole store lock from `begin` until it is
/// committed or dropped, and works on a private copy that only replaces the
/// shared state on commit. Concurrent units therefore behave like
/// serializable transactions, and a dropped unit leaves nothing behind.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCommerceStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryCommerceStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutate the committed state directly (test seeding).
    pub async fn seed(&self, f: impl FnOnce(&mut StoreState)) {
        let mut state = self.state.lock().await;
        f(&mut state);
    }

    /// Returns a copy of the committed state.
    pub async fn snapshot(&self) -> StoreState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl CommerceStore for InMemoryCommerceStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, DomainError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryUnitOfWork { guard, working }))
    }
}

struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<StoreState>,
    working: StoreState,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn insert_event(&mut self, event: &EventRecord) -> Result<(), DomainError> {
        if self.working.events.contains_key(&event.id) {
            return Err(DomainError::Conflict(format!("event {} exists", event.id)));
        }
        self.working.events.insert(event.id, event.clone());
        Ok(())
    }

    async fn find_event(&mut self, event_id: Uuid) -> Result<Option<EventRecord>, DomainError> {
        Ok(self.working.events.get(&event_id).cloned())
    }

    async fn lock_event(&mut self, event_id: Uuid) -> Result<Option<EventRecord>, DomainError> {
        self.find_event(event_id).await
    }

    async fn update_event_capacity(
        &mut self,
        event_id: Uuid,
        capacity: i32,
    ) -> Result<(), DomainError> {
        let event = self
            .working
            .events
            .get_mut(&event_id)
            .ok_or_else(|| DomainError::not_found("event", event_id))?;
        event.capacity = capacity;
        Ok(())
    }

    async fn count_active_bookings(&mut self, event_id: Uuid) -> Result<i64, DomainError> {
        let count = self
            .working
            .bookings
            .iter()
            .filter(|b| b.event_id == event_id && b.status != RecordStatus::Cancelled)
            .count();
        i64::try_from(count).map_err(|e| DomainError::Infrastructure(e.to_string()))
    }

    async fn find_booking_by_request(
        &mut self,
        request_id: Uuid,
    ) -> Result<Option<BookingRecord>, DomainError> {
        Ok(self
            .working
            .bookings
            .iter()
            .find(|b| b.request_id == request_id)
            .cloned())
    }

    async fn insert_booking(&mut self, booking: &BookingRecord) -> Result<(), DomainError> {
        if self
            .working
            .bookings
            .iter()
            .any(|b| b.id == booking.id || b.request_id == booking.request_id)
        {
            return Err(DomainError::Conflict(format!("booking {} exists", booking.id)));
        }
        self.working.bookings.push(booking.clone());
        Ok(())
    }

    async fn find_booking(
        &mut self,
        booking_id: Uuid,
    ) -> Result<Option<BookingRecord>, DomainError> {
        Ok(self
            .working
            .bookings
            .iter()
            .find(|b| b.id == booking_id)
            .cloned())
    }

    async fn lock_booking(
        &mut self,
        booking_id: Uuid,
    ) -> Result<Option<BookingRecord>, DomainError> {
        self.find_booking(booking_id).await
    }

    async fn set_booking_status(
        &mut self,
        booking_id: Uuid,
        status: RecordStatus,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let booking = self.working.booking_mut(booking_id)?;
        booking.status = status;
        booking.updated_at = at;
        Ok(())
    }

    async fn insert_order(
        &mut self,
        order: &OrderRecord,
        lines: &[OrderLine],
    ) -> Result<(), DomainError> {
        if self
            .working
            .orders
            .values()
            .any(|(o, _)| o.id == order.id || o.request_id == order.request_id)
        {
            return Err(DomainError::Conflict(format!("order {} exists", order.id)));
        }
        self.working
            .orders
            .insert(order.id, (order.clone(), lines.to_vec()));
        Ok(())
    }

    async fn find_order_by_request(
        &mut self,
        request_id: Uuid,
    ) -> Result<Option<OrderRecord>, DomainError> {
        Ok(self
            .working
            .orders
            .values()
            .find(|(o, _)| o.request_id == request_id)
            .map(|(o, _)| o.clone()))
    }

    async fn find_order(&mut self, order_id: Uuid) -> Result<Option<OrderRecord>, DomainError> {
        Ok(self.working.orders.get(&order_id).map(|(o, _)| o.clone()))
    }

    async fn lock_order(&mut self, order_id: Uuid) -> Result<Option<OrderRecord>, DomainError> {
        self.find_order(order_id).await
    }

    async fn order_lines(&mut self, order_id: Uuid) -> Result<Vec<OrderLine>, DomainError> {
        Ok(self
            .working
            .orders
            .get(&order_id)
            .map(|(_, lines)| lines.clone())
            .unwrap_or_default())
    }

    async fn update_order(&mut self, order: &OrderRecord) -> Result<(), DomainError> {
        let (stored, _) = self
            .working
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| DomainError::not_found("order", order.id))?;
        stored.status = order.status;
        stored.external_session_id.clone_from(&order.external_session_id);
        stored
            .payment_confirmation_id
            .clone_from(&order.payment_confirmation_id);
        stored.updated_at = order.updated_at;
        Ok(())
    }

    async fn insert_checkout_session(
        &mut self,
        session: &CheckoutSessionRecord,
    ) -> Result<(), DomainError> {
        if self
            .working
            .sessions
            .iter()
            .any(|s| s.session_id == session.session_id)
        {
            return Err(DomainError::Conflict(format!(
                "checkout session {} exists",
                session.session_id
            )));
        }
        self.working.sessions.push(session.clone());
        Ok(())
    }

    async fn lock_checkout_session(
        &mut self,
        session_id: &str,
    ) -> Result<Option<CheckoutSessionRecord>, DomainError> {
        Ok(self
            .working
            .sessions
            .iter()
            .find(|s| s.session_id == session_id)
            .cloned())
    }

    async fn latest_checkout_session(
        &mut self,
        kind: DomainKind,
        domain_id: Uuid,
    ) -> Result<Option<CheckoutSessionRecord>, DomainError> {
        Ok(self
            .working
            .sessions
            .iter()
            .rev()
            .find(|s| s.kind == kind && s.domain_id == domain_id)
            .cloned())
    }

    async fn set_checkout_session_status(
        &mut self,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<(), DomainError> {
        self.working.session_mut(session_id)?.status = status;
        Ok(())
    }

    async fn count_other_open_sessions(
        &mut self,
        kind: DomainKind,
        domain_id: Uuid,
        except_session_id: Option<&str>,
    ) -> Result<i64, DomainError> {
        let count = self
            .working
            .sessions
            .iter()
            .filter(|s| {
                s.kind == kind
                    && s.domain_id == domain_id
                    && s.status == SessionStatus::Open
                    && Some(s.session_id.as_str()) != except_session_id
            })
            .count();
        i64::try_from(count).map_err(|e| DomainError::Infrastructure(e.to_string()))
    }

    async fn record_payment_event(
        &mut self,
        event: &ProcessedPaymentEvent,
    ) -> Result<bool, DomainError> {
        if self
            .working
            .processed_events
            .iter()
            .any(|e| e.external_event_id == event.external_event_id)
        {
            return Ok(false);
        }
        self.working.processed_events.push(event.clone());
        Ok(true)
    }

    async fn flag_payment_event(&mut self, flag: &FlaggedPaymentEvent) -> Result<(), DomainError> {
        if !self
            .working
            .flagged_events
            .iter()
            .any(|f| f.external_event_id == flag.external_event_id)
        {
            self.working.flagged_events.push(flag.clone());
        }
        Ok(())
    }

    async fn flagged_payment_events(&mut self) -> Result<Vec<FlaggedPaymentEvent>, DomainError> {
        Ok(self.working.flagged_events.clone())
    }

    async fn insert_voucher(&mut self, voucher: &VoucherRecord) -> Result<bool, DomainError> {
        if self.working.vouchers.iter().any(|v| v.code == voucher.code) {
            return Ok(false);
        }
        self.working.vouchers.push(voucher.clone());
        Ok(true)
    }

    async fn find_voucher(&mut self, voucher_id: Uuid) -> Result<Option<VoucherRecord>, DomainError> {
        Ok(self
            .working
            .vouchers
            .iter()
            .find(|v| v.id == voucher_id)
            .cloned())
    }

    async fn find_voucher_by_code(
        &mut self,
        code: &str,
    ) -> Result<Option<VoucherRecord>, DomainError> {
        Ok(self
            .working
            .vouchers
            .iter()
            .find(|v| v.code == code)
            .cloned())
    }

    async fn lock_voucher_by_code(
        &mut self,
        code: &str,
    ) -> Result<Option<VoucherRecord>, DomainError> {
        self.find_voucher_by_code(code).await
    }

    async fn update_voucher(&mut self, voucher: &VoucherRecord) -> Result<(), DomainError> {
        let stored = self
            .working
            .vouchers
            .iter_mut()
            .find(|v| v.id == voucher.id)
            .ok_or_else(|| DomainError::not_found("voucher", voucher.id))?;
        if voucher.amount_remaining < 0 || voucher.amount_remaining > stored.amount_initial {
            return Err(DomainError::Infrastructure(format!(
                "voucher {} remaining amount out of range",
                voucher.id
            )));
        }
        stored.amount_remaining = voucher.amount_remaining;
        stored.status = voucher.status;
        Ok(())
    }

    async fn find_redemption(
        &mut self,
        redemption_id: Uuid,
    ) -> Result<Option<VoucherRedemption>, DomainError> {
        Ok(self
            .working
            .redemptions
            .iter()
            .find(|r| r.id == redemption_id)
            .cloned())
    }

    async fn insert_redemption(
        &mut self,
        redemption: &VoucherRedemption,
    ) -> Result<(), DomainError> {
        self.working.redemptions.push(redemption.clone());
        Ok(())
    }

    async fn expire_vouchers(&mut self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let mut changed = 0;
        for voucher in &mut self.working.vouchers {
            if voucher.status == VoucherStatus::Active
                && voucher.expires_at.is_some_and(|at| at <= now)
            {
                voucher.status = VoucherStatus::Expired;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn lock_stock(&mut self, product_id: Uuid) -> Result<i64, DomainError> {
        Ok(*self.working.stock_levels.entry(product_id).or_insert(0))
    }

    async fn stock_balance(&mut self, product_id: Uuid) -> Result<Option<i64>, DomainError> {
        Ok(self.working.stock_levels.get(&product_id).copied())
    }

    async fn find_stock_movement(
        &mut self,
        movement_id: Uuid,
    ) -> Result<Option<StockMovement>, DomainError> {
        Ok(self
            .working
            .stock_movements
            .iter()
            .find(|m| m.id == movement_id)
            .cloned())
    }

    async fn apply_stock_movement(&mut self, movement: &StockMovement) -> Result<(), DomainError> {
        if movement.balance_after < 0 {
            return Err(DomainError::Infrastructure(format!(
                "stock for product {} would go negative",
                movement.product_id
            )));
        }
        self.working
            .stock_levels
            .insert(movement.product_id, movement.balance_after);
        self.working.stock_movements.push(movement.clone());
        Ok(())
    }

    async fn stock_movements(
        &mut self,
        product_id: Uuid,
    ) -> Result<Vec<StockMovement>, DomainError> {
        Ok(self
            .working
            .stock_movements
            .iter()
            .filter(|m| m.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let Self { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

/// A store whose every transaction fails to open. Useful for testing
/// error-handling paths.
#[derive(Debug)]
pub struct FailingCommerceStore;

#[async_trait]
impl CommerceStore for FailingCommerceStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
