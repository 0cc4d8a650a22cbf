//! Lifecycle Reaper: retires events whose start time has passed.
//!
//! Retirement deletes the event together with its event seats. What happens
//! to the event's tickets is a policy: under [`TicketRetention::Cascade`] they
//! are deleted too, so sales history does not outlive its event; under
//! [`TicketRetention::Archive`] they are copied to the ticket archive first.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::environment::Clock;
use crate::error::Result;
use crate::ledger::InventoryLedger;
use crate::types::{EventId, RetiredEvent, TicketRetention, floor_micros};

/// Deletes past events through an injected ledger.
#[derive(Clone)]
pub struct LifecycleReaper {
    ledger: Arc<dyn InventoryLedger>,
    clock: Arc<dyn Clock>,
    retention: TicketRetention,
}

impl LifecycleReaper {
    /// Create a reaper applying `retention` to tickets of retired events.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn InventoryLedger>,
        clock: Arc<dyn Clock>,
        retention: TicketRetention,
    ) -> Self {
        Self {
            ledger,
            clock,
            retention,
        }
    }

    /// The configured ticket retention policy.
    #[must_use]
    pub const fn retention(&self) -> TicketRetention {
        self.retention
    }

    /// Retire every event that started before `now`.
    ///
    /// # Errors
    ///
    /// Only infrastructure failures.
    pub async fn retire_expired_events(&self, now: DateTime<Utc>) -> Result<Vec<RetiredEvent>> {
        let now = floor_micros(now);
        let retired = self.ledger.retire_events_before(now, self.retention).await?;
        metrics::counter!("inventory_events_retired_total").increment(retired.len() as u64);

        for event in &retired {
            tracing::info!(
                event_id = %event.event_id,
                name = %event.name,
                starts_at = %event.starts_at,
                seats_removed = event.seats_removed,
                tickets_removed = event.tickets_removed,
                tickets_archived = event.tickets_archived,
                retention = self.retention.as_str(),
                "Event retired"
            );
        }

        Ok(retired)
    }

    /// Retire one event now, whether or not it has started.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`](crate::LedgerError::NotFound) for an unknown
    /// event, or an infrastructure failure.
    pub async fn retire_event(&self, event_id: EventId) -> Result<RetiredEvent> {
        let now = floor_micros(self.clock.now());
        let event = self.ledger.retire_event(event_id, self.retention, now).await?;
        metrics::counter!("inventory_events_retired_total").increment(1);
        tracing::info!(
            event_id = %event.event_id,
            name = %event.name,
            starts_at = %event.starts_at,
            seats_removed = event.seats_removed,
            tickets_removed = event.tickets_removed,
            tickets_archived = event.tickets_archived,
            retention = self.retention.as_str(),
            "Event retired on request"
        );
        Ok(event)
    }

    /// One sweep at the clock's current time.
    ///
    /// # Errors
    ///
    /// Only infrastructure failures.
    pub async fn sweep(&self) -> Result<Vec<RetiredEvent>> {
        self.retire_expired_events(self.clock.now()).await
    }
}
