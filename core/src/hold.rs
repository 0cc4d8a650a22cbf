//! Hold Manager: best-effort, time-boxed seat reservations.
//!
//! A hold converts available seats into held seats with a deadline. Seats that
//! another transaction is locking at that moment are skipped, not waited for,
//! so a hold may grant fewer seats than requested. Callers compare the result
//! against their request; a partial hold is not an error.
//!
//! Holds are bearer tokens: the returned event seat ids are all a buyer needs
//! to settle them, and no buyer identity is recorded.

use chrono::Duration;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::environment::Clock;
use crate::error::Result;
use crate::ledger::InventoryLedger;
use crate::types::{EventId, EventSeatId, SeatId, floor_micros, hold_deadline};

/// Fallback hold duration for non-positive TTLs.
pub const DEFAULT_HOLD_TTL: Duration = Duration::minutes(15);

/// Places holds on seats through an injected ledger.
#[derive(Clone)]
pub struct HoldManager {
    ledger: Arc<dyn InventoryLedger>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
}

impl HoldManager {
    /// Create a hold manager.
    ///
    /// `default_ttl` replaces non-positive TTLs passed to [`hold`](Self::hold);
    /// a non-positive `default_ttl` itself falls back to [`DEFAULT_HOLD_TTL`].
    #[must_use]
    pub fn new(ledger: Arc<dyn InventoryLedger>, clock: Arc<dyn Clock>, default_ttl: Duration) -> Self {
        let default_ttl = if default_ttl > Duration::zero() {
            default_ttl
        } else {
            DEFAULT_HOLD_TTL
        };
        Self {
            ledger,
            clock,
            default_ttl,
        }
    }

    /// The TTL actually applied for a requested `ttl`.
    ///
    /// Non-positive values are coerced to the default rather than rejected.
    #[must_use]
    pub fn effective_ttl(&self, ttl: Duration) -> Duration {
        if ttl > Duration::zero() {
            ttl
        } else {
            self.default_ttl
        }
    }

    /// Hold the requested seats of an event for `ttl`.
    ///
    /// The deadline is rounded up to a whole microsecond and capped at
    /// [`latest_deadline`](crate::types::latest_deadline).
    ///
    /// Returns the event seat ids actually held, ordered by seat id. Seats
    /// that are sold, actively held, locked by a concurrent transaction or not
    /// part of the event are left out. An empty request returns an empty
    /// result without touching the ledger.
    ///
    /// # Errors
    ///
    /// Only infrastructure failures. [`LedgerError::Transient`](crate::LedgerError::Transient)
    /// may be retried with the same arguments.
    pub async fn hold(
        &self,
        event_id: EventId,
        seat_ids: &[SeatId],
        ttl: Duration,
    ) -> Result<Vec<EventSeatId>> {
        let requested: BTreeSet<SeatId> = seat_ids.iter().copied().collect();
        if requested.is_empty() {
            return Ok(Vec::new());
        }

        let effective = self.effective_ttl(ttl);
        if effective != ttl {
            tracing::warn!(
                %event_id,
                requested_secs = ttl.num_seconds(),
                applied_secs = effective.num_seconds(),
                "Non-positive hold TTL replaced with default"
            );
        }

        let now = floor_micros(self.clock.now());
        let (held_until, capped) = hold_deadline(now, effective);
        if capped {
            tracing::warn!(
                %event_id,
                requested_secs = effective.num_seconds(),
                %held_until,
                "Hold TTL exceeds the latest storable deadline; capped"
            );
        }
        let held = self
            .ledger
            .hold_seats(event_id, requested.iter().copied().collect(), held_until, now)
            .await?;

        metrics::counter!("inventory_hold_requested_total").increment(requested.len() as u64);
        metrics::counter!("inventory_hold_granted_total").increment(held.len() as u64);

        if held.len() < requested.len() {
            tracing::info!(
                %event_id,
                requested = requested.len(),
                granted = held.len(),
                "Partial hold"
            );
        } else {
            tracing::debug!(%event_id, granted = held.len(), %held_until, "Seats held");
        }

        Ok(held)
    }
}
