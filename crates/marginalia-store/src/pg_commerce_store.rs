//! `PostgreSQL` implementation of the `CommerceStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use marginalia_core::error::DomainError;
use marginalia_core::model::{
    BookingRecord, CheckoutSessionRecord, DomainKind, EventRecord, FlaggedPaymentEvent,
    OrderLine, OrderRecord, ProcessedPaymentEvent, RecordStatus, SessionStatus, StockMovement,
    VoucherRecord, VoucherRedemption,
};
use marginalia_core::store::{CommerceStore, UnitOfWork};

use crate::rows::{
    BookingRow, EventRow, FlagRow, MovementRow, OrderRow, RedemptionRow, SessionRow, VoucherRow,
};

const BOOKING_COLUMNS: &str =
    "id, event_id, requester_id, status, request_id, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, requester_id, status, total, voucher_code, voucher_amount, \
     request_id, external_session_id, payment_confirmation_id, created_at, updated_at";
const SESSION_COLUMNS: &str =
    "session_id, kind, domain_id, requester_id, amount, status, created_at";
const VOUCHER_COLUMNS: &str = "id, code, amount_initial, amount_remaining, status, buyer_id, \
     recipient, expires_at, issued_at";
const MOVEMENT_COLUMNS: &str =
    "id, product_id, delta, reason, actor, balance_after, occurred_at";

fn db(e: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(format!("database error: {e}"))
}

/// Maps a unique-constraint violation to `Conflict`, anything else to
/// `Infrastructure`.
fn db_insert(entity: &'static str) -> impl FnOnce(sqlx::Error) -> DomainError {
    move |e| match e.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => {
            DomainError::Conflict(format!("{entity} already exists"))
        }
        _ => db(e),
    }
}

/// PostgreSQL-backed commerce store.
#[derive(Debug, Clone)]
pub struct PgCommerceStore {
    pool: PgPool,
}

impl PgCommerceStore {
    /// Creates a new `PgCommerceStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CommerceStore for PgCommerceStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, DomainError> {
        let tx = self.pool.begin().await.map_err(db)?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

/// One database transaction. Dropping it without `commit` rolls back.
struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl PgUnitOfWork {
    async fn fetch_booking(
        &mut self,
        booking_id: Uuid,
        lock: bool,
    ) -> Result<Option<BookingRecord>, DomainError> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1{}",
            if lock { " FOR UPDATE" } else { "" }
        );
        sqlx::query_as::<_, BookingRow>(&sql)
            .bind(booking_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?
            .map(BookingRecord::try_from)
            .transpose()
    }

    async fn fetch_order(
        &mut self,
        order_id: Uuid,
        lock: bool,
    ) -> Result<Option<OrderRecord>, DomainError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1{}",
            if lock { " FOR UPDATE" } else { "" }
        );
        sqlx::query_as::<_, OrderRow>(&sql)
            .bind(order_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?
            .map(OrderRecord::try_from)
            .transpose()
    }

    async fn fetch_event(
        &mut self,
        event_id: Uuid,
        lock: bool,
    ) -> Result<Option<EventRecord>, DomainError> {
        let sql = format!(
            "SELECT id, title, capacity, unit_price, created_at FROM events WHERE id = $1{}",
            if lock { " FOR UPDATE" } else { "" }
        );
        Ok(sqlx::query_as::<_, EventRow>(&sql)
            .bind(event_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?
            .map(EventRecord::from))
    }

    async fn fetch_voucher_by_code(
        &mut self,
        code: &str,
        lock: bool,
    ) -> Result<Option<VoucherRecord>, DomainError> {
        let sql = format!(
            "SELECT {VOUCHER_COLUMNS} FROM vouchers WHERE code = $1{}",
            if lock { " FOR UPDATE" } else { "" }
        );
        sqlx::query_as::<_, VoucherRow>(&sql)
            .bind(code)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?
            .map(VoucherRecord::try_from)
            .transpose()
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn insert_event(&mut self, event: &EventRecord) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO events (id, title, capacity, unit_price, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(event.id)
        .bind(&event.title)
        .bind(event.capacity)
        .bind(event.unit_price)
        .bind(event.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_insert("event"))?;
        Ok(())
    }

    async fn find_event(&mut self, event_id: Uuid) -> Result<Option<EventRecord>, DomainError> {
        self.fetch_event(event_id, false).await
    }

    async fn lock_event(&mut self, event_id: Uuid) -> Result<Option<EventRecord>, DomainError> {
        self.fetch_event(event_id, true).await
    }

    async fn update_event_capacity(
        &mut self,
        event_id: Uuid,
        capacity: i32,
    ) -> Result<(), DomainError> {
        sqlx::query("UPDATE events SET capacity = $2 WHERE id = $1")
            .bind(event_id)
            .bind(capacity)
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;
        Ok(())
    }

    async fn count_active_bookings(&mut self, event_id: Uuid) -> Result<i64, DomainError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM bookings WHERE event_id = $1 AND status <> 'cancelled'",
        )
        .bind(event_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db)
    }

    async fn find_booking_by_request(
        &mut self,
        request_id: Uuid,
    ) -> Result<Option<BookingRecord>, DomainError> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE request_id = $1");
        sqlx::query_as::<_, BookingRow>(&sql)
            .bind(request_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?
            .map(BookingRecord::try_from)
            .transpose()
    }

    async fn insert_booking(&mut self, booking: &BookingRecord) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO bookings \
             (id, event_id, requester_id, status, request_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(booking.id)
        .bind(booking.event_id)
        .bind(booking.requester_id)
        .bind(booking.status.as_str())
        .bind(booking.request_id)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_insert("booking"))?;
        Ok(())
    }

    async fn find_booking(
        &mut self,
        booking_id: Uuid,
    ) -> Result<Option<BookingRecord>, DomainError> {
        self.fetch_booking(booking_id, false).await
    }

    async fn lock_booking(
        &mut self,
        booking_id: Uuid,
    ) -> Result<Option<BookingRecord>, DomainError> {
        self.fetch_booking(booking_id, true).await
    }

    async fn set_booking_status(
        &mut self,
        booking_id: Uuid,
        status: RecordStatus,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let result = sqlx::query("UPDATE bookings SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(booking_id)
            .bind(status.as_str())
            .bind(at)
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("booking", booking_id));
        }
        Ok(())
    }

    async fn insert_order(
        &mut self,
        order: &OrderRecord,
        lines: &[OrderLine],
    ) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO orders \
             (id, requester_id, status, total, voucher_code, voucher_amount, request_id, \
              external_session_id, payment_confirmation_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(order.id)
        .bind(order.requester_id)
        .bind(order.status.as_str())
        .bind(order.total)
        .bind(order.voucher.as_ref().map(|v| v.code.as_str()))
        .bind(order.voucher.as_ref().map(|v| v.amount))
        .bind(order.request_id)
        .bind(order.external_session_id.as_deref())
        .bind(order.payment_confirmation_id.as_deref())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_insert("order"))?;

        for (position, line) in lines.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| DomainError::Validation("too many order lines".into()))?;
            sqlx::query("INSERT INTO order_lines (order_id, position, line) VALUES ($1, $2, $3)")
                .bind(order.id)
                .bind(position)
                .bind(Json(line))
                .execute(&mut *self.tx)
                .await
                .map_err(db)?;
        }
        Ok(())
    }

    async fn find_order_by_request(
        &mut self,
        request_id: Uuid,
    ) -> Result<Option<OrderRecord>, DomainError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE request_id = $1");
        sqlx::query_as::<_, OrderRow>(&sql)
            .bind(request_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?
            .map(OrderRecord::try_from)
            .transpose()
    }

    async fn find_order(&mut self, order_id: Uuid) -> Result<Option<OrderRecord>, DomainError> {
        self.fetch_order(order_id, false).await
    }

    async fn lock_order(&mut self, order_id: Uuid) -> Result<Option<OrderRecord>, DomainError> {
        self.fetch_order(order_id, true).await
    }

    async fn order_lines(&mut self, order_id: Uuid) -> Result<Vec<OrderLine>, DomainError> {
        let lines = sqlx::query_scalar::<_, Json<OrderLine>>(
            "SELECT line FROM order_lines WHERE order_id = $1 ORDER BY position",
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(lines.into_iter().map(|Json(line)| line).collect())
    }

    async fn update_order(&mut self, order: &OrderRecord) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE orders SET status = $2, external_session_id = $3, \
             payment_confirmation_id = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(order.id)
        .bind(order.status.as_str())
        .bind(order.external_session_id.as_deref())
        .bind(order.payment_confirmation_id.as_deref())
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("order", order.id));
        }
        Ok(())
    }

    async fn insert_checkout_session(
        &mut self,
        session: &CheckoutSessionRecord,
    ) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO checkout_sessions \
             (session_id, kind, domain_id, requester_id, amount, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&session.session_id)
        .bind(session.kind.as_str())
        .bind(session.domain_id)
        .bind(session.requester_id)
        .bind(session.amount)
        .bind(session.status.as_str())
        .bind(session.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_insert("checkout session"))?;
        Ok(())
    }

    async fn lock_checkout_session(
        &mut self,
        session_id: &str,
    ) -> Result<Option<CheckoutSessionRecord>, DomainError> {
        let sql =
            format!("SELECT {SESSION_COLUMNS} FROM checkout_sessions WHERE session_id = $1 FOR UPDATE");
        sqlx::query_as::<_, SessionRow>(&sql)
            .bind(session_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?
            .map(CheckoutSessionRecord::try_from)
            .transpose()
    }

    async fn latest_checkout_session(
        &mut self,
        kind: DomainKind,
        domain_id: Uuid,
    ) -> Result<Option<CheckoutSessionRecord>, DomainError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM checkout_sessions \
             WHERE kind = $1 AND domain_id = $2 ORDER BY seq DESC LIMIT 1"
        );
        sqlx::query_as::<_, SessionRow>(&sql)
            .bind(kind.as_str())
            .bind(domain_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?
            .map(CheckoutSessionRecord::try_from)
            .transpose()
    }

    async fn set_checkout_session_status(
        &mut self,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<(), DomainError> {
        sqlx::query("UPDATE checkout_sessions SET status = $2 WHERE session_id = $1")
            .bind(session_id)
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;
        Ok(())
    }

    async fn count_other_open_sessions(
        &mut self,
        kind: DomainKind,
        domain_id: Uuid,
        except_session_id: Option<&str>,
    ) -> Result<i64, DomainError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM checkout_sessions \
             WHERE kind = $1 AND domain_id = $2 AND status = 'open' \
               AND ($3::TEXT IS NULL OR session_id <> $3)",
        )
        .bind(kind.as_str())
        .bind(domain_id)
        .bind(except_session_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db)
    }

    async fn record_payment_event(
        &mut self,
        event: &ProcessedPaymentEvent,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "INSERT INTO processed_payment_events \
             (external_event_id, event_type, session_id, processed_at) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (external_event_id) DO NOTHING",
        )
        .bind(&event.external_event_id)
        .bind(&event.event_type)
        .bind(event.session_id.as_deref())
        .bind(event.processed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        let fresh = result.rows_affected() == 1;
        if !fresh {
            debug!(external_event_id = %event.external_event_id, "payment event already recorded");
        }
        Ok(fresh)
    }

    async fn flag_payment_event(&mut self, flag: &FlaggedPaymentEvent) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO flagged_payment_events \
             (external_event_id, reason, detail, payload, flagged_at) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT (external_event_id) DO NOTHING",
        )
        .bind(&flag.external_event_id)
        .bind(flag.reason.as_str())
        .bind(&flag.detail)
        .bind(&flag.payload)
        .bind(flag.flagged_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn flagged_payment_events(&mut self) -> Result<Vec<FlaggedPaymentEvent>, DomainError> {
        sqlx::query_as::<_, FlagRow>(
            "SELECT external_event_id, reason, detail, payload, flagged_at \
             FROM flagged_payment_events ORDER BY seq",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?
        .into_iter()
        .map(FlaggedPaymentEvent::try_from)
        .collect()
    }

    async fn insert_voucher(&mut self, voucher: &VoucherRecord) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "INSERT INTO vouchers \
             (id, code, amount_initial, amount_remaining, status, buyer_id, recipient, \
              expires_at, issued_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) ON CONFLICT (code) DO NOTHING",
        )
        .bind(voucher.id)
        .bind(&voucher.code)
        .bind(voucher.amount_initial)
        .bind(voucher.amount_remaining)
        .bind(voucher.status.as_str())
        .bind(voucher.buyer_id)
        .bind(voucher.recipient.as_deref())
        .bind(voucher.expires_at)
        .bind(voucher.issued_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_insert("voucher"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_voucher(&mut self, voucher_id: Uuid) -> Result<Option<VoucherRecord>, DomainError> {
        let sql = format!("SELECT {VOUCHER_COLUMNS} FROM vouchers WHERE id = $1");
        sqlx::query_as::<_, VoucherRow>(&sql)
            .bind(voucher_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?
            .map(VoucherRecord::try_from)
            .transpose()
    }

    async fn find_voucher_by_code(
        &mut self,
        code: &str,
    ) -> Result<Option<VoucherRecord>, DomainError> {
        self.fetch_voucher_by_code(code, false).await
    }

    async fn lock_voucher_by_code(
        &mut self,
        code: &str,
    ) -> Result<Option<VoucherRecord>, DomainError> {
        self.fetch_voucher_by_code(code, true).await
    }

    async fn update_voucher(&mut self, voucher: &VoucherRecord) -> Result<(), DomainError> {
        sqlx::query("UPDATE vouchers SET amount_remaining = $2, status = $3 WHERE id = $1")
            .bind(voucher.id)
            .bind(voucher.amount_remaining)
            .bind(voucher.status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;
        Ok(())
    }

    async fn find_redemption(
        &mut self,
        redemption_id: Uuid,
    ) -> Result<Option<VoucherRedemption>, DomainError> {
        Ok(sqlx::query_as::<_, RedemptionRow>(
            "SELECT id, voucher_id, amount, remaining_after, order_id, actor, redeemed_at \
             FROM voucher_redemptions WHERE id = $1",
        )
        .bind(redemption_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?
        .map(VoucherRedemption::from))
    }

    async fn insert_redemption(
        &mut self,
        redemption: &VoucherRedemption,
    ) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO voucher_redemptions \
             (id, voucher_id, amount, remaining_after, order_id, actor, redeemed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(redemption.id)
        .bind(redemption.voucher_id)
        .bind(redemption.amount)
        .bind(redemption.remaining_after)
        .bind(redemption.order_id)
        .bind(&redemption.actor)
        .bind(redemption.redeemed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_insert("voucher redemption"))?;
        Ok(())
    }

    async fn expire_vouchers(&mut self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let result = sqlx::query(
            "UPDATE vouchers SET status = 'expired' \
             WHERE status = 'active' AND expires_at IS NOT NULL AND expires_at <= $1",
        )
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(result.rows_affected())
    }

    async fn lock_stock(&mut self, product_id: Uuid) -> Result<i64, DomainError> {
        sqlx::query(
            "INSERT INTO stock_levels (product_id, balance) VALUES ($1, 0) \
             ON CONFLICT (product_id) DO NOTHING",
        )
        .bind(product_id)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        sqlx::query_scalar::<_, i64>(
            "SELECT balance FROM stock_levels WHERE product_id = $1 FOR UPDATE",
        )
        .bind(product_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db)
    }

    async fn stock_balance(&mut self, product_id: Uuid) -> Result<Option<i64>, DomainError> {
        sqlx::query_scalar::<_, i64>("SELECT balance FROM stock_levels WHERE product_id = $1")
            .bind(product_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)
    }

    async fn find_stock_movement(
        &mut self,
        movement_id: Uuid,
    ) -> Result<Option<StockMovement>, DomainError> {
        let sql = format!("SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE id = $1");
        Ok(sqlx::query_as::<_, MovementRow>(&sql)
            .bind(movement_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?
            .map(StockMovement::from))
    }

    async fn apply_stock_movement(&mut self, movement: &StockMovement) -> Result<(), DomainError> {
        sqlx::query("UPDATE stock_levels SET balance = $2 WHERE product_id = $1")
            .bind(movement.product_id)
            .bind(movement.balance_after)
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;
        sqlx::query(
            "INSERT INTO stock_movements \
             (id, product_id, delta, reason, actor, balance_after, occurred_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(movement.id)
        .bind(movement.product_id)
        .bind(movement.delta)
        .bind(&movement.reason)
        .bind(&movement.actor)
        .bind(movement.balance_after)
        .bind(movement.occurred_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_insert("stock movement"))?;
        Ok(())
    }

    async fn stock_movements(
        &mut self,
        product_id: Uuid,
    ) -> Result<Vec<StockMovement>, DomainError> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE product_id = $1 ORDER BY seq"
        );
        Ok(sqlx::query_as::<_, MovementRow>(&sql)
            .bind(product_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db)?
            .into_iter()
            .map(StockMovement::from)
            .collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx.commit().await.map_err(db)
    }
}
