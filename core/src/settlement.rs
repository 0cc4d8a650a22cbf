//! Settlement Engine: turns seats into permanent sales.
//!
//! "Buy directly" and "buy after holding" share one code path and one
//! eligibility rule: a seat is sold if it is available, under an active hold
//! (whoever placed it), or under a hold that has already elapsed, which is
//! reclaimed on touch. Sold seats are skipped, never sold twice.
//!
//! The result lists successes only, in the caller's order. Callers compare
//! `sold.len()` with what they asked for to detect partial settlement.

use std::collections::HashSet;
use std::sync::Arc;

use crate::environment::Clock;
use crate::error::Result;
use crate::ledger::InventoryLedger;
use crate::types::{CustomerId, EventId, EventSeatId, SoldSeat, floor_micros};

/// Sells seats through an injected ledger.
#[derive(Clone)]
pub struct SettlementEngine {
    ledger: Arc<dyn InventoryLedger>,
    clock: Arc<dyn Clock>,
}

impl SettlementEngine {
    /// Create a settlement engine.
    #[must_use]
    pub fn new(ledger: Arc<dyn InventoryLedger>, clock: Arc<dyn Clock>) -> Self {
        Self { ledger, clock }
    }

    /// Sell the given event seats of `event_id` to `customer_id`.
    ///
    /// Accepts raw ids from any source. Each id is processed once, in the
    /// order given; duplicates after the first occurrence are ignored. The
    /// returned tickets follow that order.
    ///
    /// # Errors
    ///
    /// Only infrastructure failures. [`LedgerError::Transient`](crate::LedgerError::Transient)
    /// may be retried with the same arguments.
    pub async fn settle(
        &self,
        event_id: EventId,
        event_seat_ids: &[EventSeatId],
        customer_id: CustomerId,
    ) -> Result<Vec<SoldSeat>> {
        let mut seen = HashSet::with_capacity(event_seat_ids.len());
        let ordered: Vec<EventSeatId> = event_seat_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();
        if ordered.is_empty() {
            return Ok(Vec::new());
        }

        let requested = ordered.len();
        let now = floor_micros(self.clock.now());
        let sold = self
            .ledger
            .settle_seats(event_id, ordered, customer_id, now)
            .await?;

        metrics::counter!("inventory_settle_requested_total").increment(requested as u64);
        metrics::counter!("inventory_settle_sold_total").increment(sold.len() as u64);

        if sold.len() < requested {
            tracing::info!(
                %event_id,
                %customer_id,
                requested,
                sold = sold.len(),
                "Partial settlement"
            );
        } else {
            tracing::info!(
                %event_id,
                %customer_id,
                sold = sold.len(),
                total = ?SoldSeat::total(&sold),
                "Seats sold"
            );
        }

        Ok(sold)
    }

    /// Finalize a purchase of seats previously returned by
    /// [`HoldManager::hold`](crate::HoldManager::hold).
    ///
    /// Identical to [`settle`](Self::settle): holds are honored by id, and a
    /// hold that ran out is still sold if nobody else took the seat.
    ///
    /// # Errors
    ///
    /// Same as [`settle`](Self::settle).
    pub async fn finalize_held(
        &self,
        event_id: EventId,
        held: &[EventSeatId],
        customer_id: CustomerId,
    ) -> Result<Vec<SoldSeat>> {
        self.settle(event_id, held, customer_id).await
    }
}
