//! Background voucher expiry housekeeping.
//!
//! Redemption checks expiry at read time, so the sweep only keeps stored
//! statuses tidy for reporting.

use std::sync::Arc;
use std::time::Duration;

use marginalia_core::actor::Actor;
use marginalia_core::clock::SharedClock;
use marginalia_core::error::DomainError;
use marginalia_core::store::CommerceStore;
use marginalia_vouchers::application::command_handlers::handle_expire_vouchers;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Periodically marks lapsed vouchers as expired.
pub struct VoucherSweeper {
    store: Arc<dyn CommerceStore>,
    clock: SharedClock,
    interval: Duration,
    actor: Actor,
}

impl VoucherSweeper {
    /// Creates a sweeper that runs every `interval`.
    #[must_use]
    pub fn new(store: Arc<dyn CommerceStore>, clock: SharedClock, interval: Duration) -> Self {
        Self {
            store,
            clock,
            interval,
            actor: Actor::system("voucher-sweep"),
        }
    }

    /// Spawns the sweeper as a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                match self.run_once().await {
                    Ok(count) if count > 0 => info!(expired = count, "voucher sweep finished"),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "voucher sweep failed"),
                }
            }
        })
    }

    /// Runs one sweep.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store fails.
    pub async fn run_once(&self) -> Result<u64, DomainError> {
        handle_expire_vouchers(&self.actor, self.clock.as_ref(), self.store.as_ref()).await
    }
}
