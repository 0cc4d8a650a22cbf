//! Expiry Reclaimer: corrective sweep for abandoned holds.
//!
//! Holds already self-heal when a settlement touches them. The sweep exists
//! so seats nobody tries to buy still return to the visible available pool.
//! It is idempotent and safe to run alongside holds and settlements.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::environment::Clock;
use crate::error::Result;
use crate::ledger::InventoryLedger;
use crate::types::floor_micros;

/// Returns elapsed holds to the available pool.
#[derive(Clone)]
pub struct ExpiryReclaimer {
    ledger: Arc<dyn InventoryLedger>,
    clock: Arc<dyn Clock>,
}

impl ExpiryReclaimer {
    /// Create a reclaimer.
    #[must_use]
    pub fn new(ledger: Arc<dyn InventoryLedger>, clock: Arc<dyn Clock>) -> Self {
        Self { ledger, clock }
    }

    /// Reclaim every hold whose deadline is at or before `now`, truncated to
    /// whole microseconds.
    ///
    /// Returns the number of seats reclaimed.
    ///
    /// # Errors
    ///
    /// Only infrastructure failures.
    pub async fn reclaim_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let now = floor_micros(now);
        let reclaimed = self.ledger.reclaim_expired(now).await?;
        metrics::counter!("inventory_sweep_reclaimed_total").increment(reclaimed);
        if reclaimed > 0 {
            tracing::info!(reclaimed, %now, "Expired holds reclaimed");
        } else {
            tracing::debug!(%now, "No expired holds");
        }
        Ok(reclaimed)
    }

    /// One sweep at the clock's current time.
    ///
    /// # Errors
    ///
    /// Only infrastructure failures.
    pub async fn sweep(&self) -> Result<u64> {
        self.reclaim_expired(self.clock.now()).await
    }
}
