//! Unit-of-work abstraction over the relational store.
//!
//! Every state transition opens exactly one [`UnitOfWork`], declares the
//! records it touches through the `lock_*` methods, and either commits or
//! drops it. Dropping an uncommitted unit rolls everything back, so an early
//! return on a rejected business rule leaves no trace.
//!
//! `lock_*` methods take a row lock that is held until the unit ends:
//! concurrent units locking the same record are serialized. `find_*` methods
//! read without locking and are meant for queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;
use crate::model::{
    BookingRecord, CheckoutSessionRecord, DomainKind, EventRecord, FlaggedPaymentEvent,
    OrderLine, OrderRecord, ProcessedPaymentEvent, RecordStatus, SessionStatus, StockMovement,
    VoucherRecord, VoucherRedemption,
};

/// Entry point to the store: hands out transactions.
#[async_trait]
pub trait CommerceStore: Send + Sync {
    /// Opens a new unit of work.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, DomainError>;
}

/// One transaction against the store.
#[async_trait]
pub trait UnitOfWork: Send {
    // --- events & bookings ---

    /// Inserts a new event.
    async fn insert_event(&mut self, event: &EventRecord) -> Result<(), DomainError>;

    /// Loads an event without locking it.
    async fn find_event(&mut self, event_id: Uuid) -> Result<Option<EventRecord>, DomainError>;

    /// Loads an event and locks it for the rest of the unit.
    async fn lock_event(&mut self, event_id: Uuid) -> Result<Option<EventRecord>, DomainError>;

    /// Sets the capacity of an event.
    async fn update_event_capacity(
        &mut self,
        event_id: Uuid,
        capacity: i32,
    ) -> Result<(), DomainError>;

    /// Counts bookings for the event that are not cancelled.
    async fn count_active_bookings(&mut self, event_id: Uuid) -> Result<i64, DomainError>;

    /// Finds the booking created by an earlier admission with this request id.
    async fn find_booking_by_request(
        &mut self,
        request_id: Uuid,
    ) -> Result<Option<BookingRecord>, DomainError>;

    /// Inserts a new booking.
    async fn insert_booking(&mut self, booking: &BookingRecord) -> Result<(), DomainError>;

    /// Loads a booking without locking it.
    async fn find_booking(&mut self, booking_id: Uuid)
    -> Result<Option<BookingRecord>, DomainError>;

    /// Loads a booking and locks it.
    async fn lock_booking(&mut self, booking_id: Uuid)
    -> Result<Option<BookingRecord>, DomainError>;

    /// Sets the status of a booking.
    async fn set_booking_status(
        &mut self,
        booking_id: Uuid,
        status: RecordStatus,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError>;

    // --- orders ---

    /// Inserts an order together with its lines.
    async fn insert_order(
        &mut self,
        order: &OrderRecord,
        lines: &[OrderLine],
    ) -> Result<(), DomainError>;

    /// Finds the order created by an earlier placement with this request id.
    async fn find_order_by_request(
        &mut self,
        request_id: Uuid,
    ) -> Result<Option<OrderRecord>, DomainError>;

    /// Loads an order without locking it.
    async fn find_order(&mut self, order_id: Uuid) -> Result<Option<OrderRecord>, DomainError>;

    /// Loads an order and locks it.
    async fn lock_order(&mut self, order_id: Uuid) -> Result<Option<OrderRecord>, DomainError>;

    /// Loads the lines of an order in placement order.
    async fn order_lines(&mut self, order_id: Uuid) -> Result<Vec<OrderLine>, DomainError>;

    /// Writes back the mutable fields of an order (status, session id,
    /// confirmation id, updated-at).
    async fn update_order(&mut self, order: &OrderRecord) -> Result<(), DomainError>;

    // --- checkout sessions ---

    /// Records an issued payment session.
    async fn insert_checkout_session(
        &mut self,
        session: &CheckoutSessionRecord,
    ) -> Result<(), DomainError>;

    /// Loads a session and locks it.
    async fn lock_checkout_session(
        &mut self,
        session_id: &str,
    ) -> Result<Option<CheckoutSessionRecord>, DomainError>;

    /// Returns the most recently issued session for a record.
    async fn latest_checkout_session(
        &mut self,
        kind: DomainKind,
        domain_id: Uuid,
    ) -> Result<Option<CheckoutSessionRecord>, DomainError>;

    /// Sets the status of a session.
    async fn set_checkout_session_status(
        &mut self,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<(), DomainError>;

    /// Counts open sessions for a record, excluding `except_session_id`.
    async fn count_other_open_sessions(
        &mut self,
        kind: DomainKind,
        domain_id: Uuid,
        except_session_id: Option<&str>,
    ) -> Result<i64, DomainError>;

    // --- payment notifications ---

    /// Records a consumed notification. Returns `false` when the external
    /// event id was already recorded; the caller must then apply nothing.
    async fn record_payment_event(
        &mut self,
        event: &ProcessedPaymentEvent,
    ) -> Result<bool, DomainError>;

    /// Parks a notification for operator review. Re-flagging the same
    /// external event id keeps the first entry.
    async fn flag_payment_event(&mut self, flag: &FlaggedPaymentEvent) -> Result<(), DomainError>;

    /// Lists notifications awaiting operator review, oldest first.
    async fn flagged_payment_events(&mut self) -> Result<Vec<FlaggedPaymentEvent>, DomainError>;

    // --- vouchers ---

    /// Inserts a voucher. Returns `false` if the code is already taken.
    async fn insert_voucher(&mut self, voucher: &VoucherRecord) -> Result<bool, DomainError>;

    /// Loads a voucher by id without locking it.
    async fn find_voucher(&mut self, voucher_id: Uuid) -> Result<Option<VoucherRecord>, DomainError>;

    /// Loads a voucher by code without locking it.
    async fn find_voucher_by_code(
        &mut self,
        code: &str,
    ) -> Result<Option<VoucherRecord>, DomainError>;

    /// Loads a voucher by code and locks it.
    async fn lock_voucher_by_code(
        &mut self,
        code: &str,
    ) -> Result<Option<VoucherRecord>, DomainError>;

    /// Writes back the remaining amount and status of a voucher.
    async fn update_voucher(&mut self, voucher: &VoucherRecord) -> Result<(), DomainError>;

    /// Finds an applied redemption by its id.
    async fn find_redemption(
        &mut self,
        redemption_id: Uuid,
    ) -> Result<Option<VoucherRedemption>, DomainError>;

    /// Appends a redemption to the voucher's history.
    async fn insert_redemption(&mut self, redemption: &VoucherRedemption)
    -> Result<(), DomainError>;

    /// Marks every active voucher whose expiry is at or before `now` as
    /// expired. Returns how many changed.
    async fn expire_vouchers(&mut self, now: DateTime<Utc>) -> Result<u64, DomainError>;

    // --- inventory ---

    /// Locks the stock counter of a product, creating it at zero if the
    /// product has never been stocked. Returns the stored balance.
    async fn lock_stock(&mut self, product_id: Uuid) -> Result<i64, DomainError>;

    /// Reads the stored balance without locking. Untracked products are `None`.
    async fn stock_balance(&mut self, product_id: Uuid) -> Result<Option<i64>, DomainError>;

    /// Finds a movement by id.
    async fn find_stock_movement(
        &mut self,
        movement_id: Uuid,
    ) -> Result<Option<StockMovement>, DomainError>;

    /// Sets the counter to `movement.balance_after` and appends the movement.
    /// The counter must already be locked through [`UnitOfWork::lock_stock`].
    async fn apply_stock_movement(&mut self, movement: &StockMovement) -> Result<(), DomainError>;

    /// Lists a product's movements, oldest first.
    async fn stock_movements(&mut self, product_id: Uuid)
    -> Result<Vec<StockMovement>, DomainError>;

    // --- lifecycle ---

    /// Commits every write made through this unit.
    async fn commit(self: Box<Self>) -> Result<(), DomainError>;
}
