//! [`InventoryLedger`] over a `PostgreSQL` connection pool.

use chrono::{DateTime, Utc};
use seat_inventory_core::ledger::{InventoryLedger, LedgerFuture};
use seat_inventory_core::seat::SeatStatus;
use seat_inventory_core::types::{
    ArchivedTicket, CustomerId, EventId, EventSeatId, EventSeatSnapshot, RetiredEvent, SeatId,
    SoldSeat, Ticket, TicketId, TicketRetention, ceil_micros, floor_micros, latest_deadline,
};
use seat_inventory_core::{LedgerError, Result};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::ledger_error;
use crate::locking;
use crate::rows::{self, EVENT_SEAT_COLUMNS};

/// Connection pool settings for [`PostgresLedger::connect`].
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Maximum pooled connections
    pub max_connections: u32,
    /// Connections kept open when idle
    pub min_connections: u32,
    /// How long to wait for a connection before failing
    pub acquire_timeout: Duration,
    /// Close connections idle for longer than this
    pub idle_timeout: Duration,
    /// Recycle connections older than this
    pub max_lifetime: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// Result of [`PostgresLedger::health_check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    /// `SELECT version()` output
    pub server_version: String,
    /// Server clock at the time of the check
    pub server_time: DateTime<Utc>,
}

/// `PostgreSQL`-backed inventory ledger.
///
/// Every operation runs in its own transaction acquired from the pool and
/// released on every exit path (commit, or rollback when the transaction is
/// dropped on error).
#[derive(Clone)]
pub struct PostgresLedger {
    pub(crate) pool: PgPool,
}

impl PostgresLedger {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with explicit pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Database`] if the connection fails.
    pub async fn connect(database_url: &str, settings: &PoolSettings) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.acquire_timeout)
            .idle_timeout(Some(settings.idle_timeout))
            .max_lifetime(Some(settings.max_lifetime))
            .connect(database_url)
            .await
            .map_err(|e| ledger_error("Failed to connect", e))?;

        Ok(Self::from_pool(pool))
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| LedgerError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Check connectivity, returning the server version and clock.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Database`] or [`LedgerError::Transient`] when the
    /// server cannot be reached.
    pub async fn health_check(&self) -> Result<HealthStatus> {
        let row = sqlx::query("SELECT version() AS server_version, now() AS server_time")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ledger_error("Health check failed", e))?;

        Ok(HealthStatus {
            server_version: row
                .try_get("server_version")
                .map_err(|e| ledger_error("Health check failed", e))?,
            server_time: row
                .try_get("server_time")
                .map_err(|e| ledger_error("Health check failed", e))?,
        })
    }

    /// Tickets archived when `event_id` was retired, oldest sale first.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Database`] if the query fails.
    pub async fn archived_tickets(&self, event_id: EventId) -> Result<Vec<ArchivedTicket>> {
        let records = sqlx::query(
            r"
            SELECT ticket_id, customer_id, event_id, event_name, seat_label,
                   price_minor, purchased_at, archived_at
            FROM archived_tickets
            WHERE event_id = $1
            ORDER BY purchased_at, ticket_id
            ",
        )
        .bind(event_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ledger_error("Failed to load archived tickets", e))?;

        records
            .iter()
            .map(|row| {
                let decode = |e| ledger_error("Failed to decode archived ticket", e);
                Ok(ArchivedTicket {
                    ticket_id: TicketId::new(row.try_get("ticket_id").map_err(decode)?),
                    customer_id: CustomerId::new(row.try_get("customer_id").map_err(decode)?),
                    event_id: EventId::new(row.try_get("event_id").map_err(decode)?),
                    event_name: row.try_get("event_name").map_err(decode)?,
                    seat_label: row.try_get("seat_label").map_err(decode)?,
                    price: rows::money(row.try_get("price_minor").map_err(decode)?)?,
                    purchased_at: row.try_get("purchased_at").map_err(decode)?,
                    archived_at: row.try_get("archived_at").map_err(decode)?,
                })
            })
            .collect()
    }

    async fn hold(
        &self,
        event_id: EventId,
        seat_ids: &[SeatId],
        held_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<EventSeatId>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ledger_error("Failed to start transaction", e))?;

        let candidates = locking::lock_hold_candidates(&mut *tx, event_id, seat_ids, now).await?;

        let mut held = Vec::with_capacity(candidates.len());
        let mut reclaimed: u64 = 0;
        for mut seat in candidates {
            let was_held = seat.status == SeatStatus::Held;
            if seat.try_hold(held_until, now) {
                reclaimed += u64::from(was_held);
                held.push(seat.id);
            }
        }

        if !held.is_empty() {
            sqlx::query("UPDATE event_seats SET status = 'HELD', held_until = $2 WHERE id = ANY($1)")
                .bind(rows::ids(&held, EventSeatId::get))
                .bind(held_until)
                .execute(&mut *tx)
                .await
                .map_err(|e| ledger_error("Failed to hold seats", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| ledger_error("Failed to commit hold", e))?;

        if reclaimed > 0 {
            metrics::counter!("inventory_lazy_reclaimed_total").increment(reclaimed);
        }
        Ok(held)
    }

    async fn settle(
        &self,
        event_id: EventId,
        event_seat_ids: &[EventSeatId],
        customer_id: CustomerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<SoldSeat>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ledger_error("Failed to start transaction", e))?;

        let customer = sqlx::query("SELECT 1 FROM customers WHERE id = $1")
            .bind(customer_id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| ledger_error("Failed to load customer", e))?;
        if customer.is_none() {
            return Err(LedgerError::not_found("customer", customer_id));
        }

        let mut locked: HashMap<EventSeatId, _> =
            locking::lock_for_settlement(&mut *tx, event_id, event_seat_ids)
                .await?
                .into_iter()
                .map(|(seat, label)| (seat.id, (seat, label)))
                .collect();

        let mut sold = Vec::new();
        let mut reclaimed: u64 = 0;
        for id in event_seat_ids {
            let Some((seat, label)) = locked.get_mut(id) else {
                continue;
            };
            let expired = seat.status == SeatStatus::Held && !seat.has_active_hold(now);
            // A repeated id finds the seat already sold here.
            if !seat.try_sell(now) {
                continue;
            }
            reclaimed += u64::from(expired);

            sqlx::query("UPDATE event_seats SET status = 'SOLD', held_until = NULL WHERE id = $1")
                .bind(id.get())
                .execute(&mut *tx)
                .await
                .map_err(|e| ledger_error("Failed to mark seat sold", e))?;

            let ticket_id: i64 = sqlx::query_scalar(
                r"
                INSERT INTO tickets (customer_id, event_seat_id, price_minor, purchased_at)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                ",
            )
            .bind(customer_id.get())
            .bind(id.get())
            .bind(rows::minor(seat.price)?)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| ledger_error("Failed to create ticket", e))?;

            sold.push(SoldSeat {
                ticket: Ticket {
                    id: TicketId::new(ticket_id),
                    customer_id,
                    event_seat_id: *id,
                    price: seat.price,
                    purchased_at: now,
                },
                seat_label: std::mem::take(label),
            });
        }

        tx.commit()
            .await
            .map_err(|e| ledger_error("Failed to commit settlement", e))?;

        if reclaimed > 0 {
            metrics::counter!("inventory_lazy_reclaimed_total").increment(reclaimed);
        }
        Ok(sold)
    }

    async fn reclaim(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r"
            UPDATE event_seats
            SET status = 'AVAILABLE', held_until = NULL
            WHERE status = 'HELD'
              AND (held_until IS NULL OR held_until <= $1)
            ",
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| ledger_error("Failed to reclaim expired holds", e))?;

        Ok(result.rows_affected())
    }

    async fn retire(&self, cutoff: DateTime<Utc>, retention: TicketRetention) -> Result<Vec<RetiredEvent>> {
        let past: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM events WHERE starts_at < $1 ORDER BY starts_at, id",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ledger_error("Failed to list past events", e))?;

        let mut retired = Vec::with_capacity(past.len());
        for event_id in past {
            let event_id = EventId::new(event_id);
            if let Some(summary) = self.retire_one(event_id, Some(cutoff), retention, cutoff).await? {
                retired.push(summary);
            }
        }
        Ok(retired)
    }

    /// Retire one event in its own transaction.
    ///
    /// With a `cutoff` only an event starting before it qualifies. Returns
    /// `None` if the event is gone or no longer qualifies.
    async fn retire_one(
        &self,
        event_id: EventId,
        cutoff: Option<DateTime<Utc>>,
        retention: TicketRetention,
        archived_at: DateTime<Utc>,
    ) -> Result<Option<RetiredEvent>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ledger_error("Failed to start transaction", e))?;

        let Some(event) = sqlx::query(
            r"
            SELECT id, venue_id, name, starts_at, description
            FROM events
            WHERE id = $1 AND ($2::timestamptz IS NULL OR starts_at < $2)
            FOR UPDATE
            ",
        )
        .bind(event_id.get())
        .bind(cutoff)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| ledger_error("Failed to lock event", e))?
        else {
            return Ok(None);
        };
        let event = rows::event(&event)?;

        // Wait for in-flight holds and settlements on this event's seats.
        let seat_rows: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM event_seats WHERE event_id = $1 ORDER BY id FOR UPDATE")
                .bind(event_id.get())
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| ledger_error("Failed to lock event seats", e))?;

        let tickets_removed: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM tickets t
            JOIN event_seats es ON es.id = t.event_seat_id
            WHERE es.event_id = $1
            ",
        )
        .bind(event_id.get())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| ledger_error("Failed to count tickets", e))?;

        let tickets_archived = match retention {
            TicketRetention::Cascade => 0,
            TicketRetention::Archive => sqlx::query(
                r"
                INSERT INTO archived_tickets
                    (ticket_id, customer_id, event_id, event_name, seat_label,
                     price_minor, purchased_at, archived_at)
                SELECT t.id, t.customer_id, e.id, e.name, s.seat_row || s.number::text,
                       t.price_minor, t.purchased_at, $2
                FROM tickets t
                JOIN event_seats es ON es.id = t.event_seat_id
                JOIN seats s ON s.id = es.seat_id
                JOIN events e ON e.id = es.event_id
                WHERE es.event_id = $1
                ON CONFLICT (ticket_id) DO NOTHING
                ",
            )
            .bind(event_id.get())
            .bind(archived_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| ledger_error("Failed to archive tickets", e))?
            .rows_affected(),
        };

        // Cascades to event_seats and their tickets.
        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(event_id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| ledger_error("Failed to delete event", e))?;

        tx.commit()
            .await
            .map_err(|e| ledger_error("Failed to commit retirement", e))?;

        Ok(Some(RetiredEvent {
            event_id: event.id,
            name: event.name,
            starts_at: event.starts_at,
            seats_removed: seat_rows.len() as u64,
            tickets_removed: u64::try_from(tickets_removed).unwrap_or_default(),
            tickets_archived,
        }))
    }

    async fn snapshot(&self, id: EventSeatId) -> Result<EventSeatSnapshot> {
        let sql = format!(
            "SELECT {EVENT_SEAT_COLUMNS} FROM event_seats es JOIN seats s ON s.id = es.seat_id WHERE es.id = $1"
        );
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ledger_error("Failed to load event seat", e))?
            .ok_or_else(|| LedgerError::not_found("event seat", id))?;

        rows::snapshot(&row)
    }
}

/// Record how long one ledger operation took.
fn timed(op: &'static str, started: Instant) {
    metrics::histogram!("inventory_ledger_tx_duration_seconds", "op" => op)
        .record(started.elapsed().as_secs_f64());
}

impl InventoryLedger for PostgresLedger {
    fn hold_seats(
        &self,
        event_id: EventId,
        seat_ids: Vec<SeatId>,
        held_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> LedgerFuture<'_, Vec<EventSeatId>> {
        Box::pin(async move {
            if seat_ids.is_empty() {
                return Ok(Vec::new());
            }
            // Stored timestamps carry microseconds.
            let held_until = ceil_micros(held_until).min(latest_deadline());
            let now = floor_micros(now);
            let started = Instant::now();
            let result = self.hold(event_id, &seat_ids, held_until, now).await;
            timed("hold", started);
            result
        })
    }

    fn settle_seats(
        &self,
        event_id: EventId,
        event_seat_ids: Vec<EventSeatId>,
        customer_id: CustomerId,
        now: DateTime<Utc>,
    ) -> LedgerFuture<'_, Vec<SoldSeat>> {
        Box::pin(async move {
            if event_seat_ids.is_empty() {
                return Ok(Vec::new());
            }
            let started = Instant::now();
            let result = self
                .settle(event_id, &event_seat_ids, customer_id, floor_micros(now))
                .await;
            timed("settle", started);
            result
        })
    }

    fn reclaim_expired(&self, now: DateTime<Utc>) -> LedgerFuture<'_, u64> {
        Box::pin(async move {
            let started = Instant::now();
            let result = self.reclaim(floor_micros(now)).await;
            timed("reclaim", started);
            result
        })
    }

    fn retire_events_before(
        &self,
        cutoff: DateTime<Utc>,
        retention: TicketRetention,
    ) -> LedgerFuture<'_, Vec<RetiredEvent>> {
        Box::pin(async move {
            let started = Instant::now();
            let result = self.retire(cutoff, retention).await;
            timed("retire", started);
            result
        })
    }

    fn retire_event(
        &self,
        event_id: EventId,
        retention: TicketRetention,
        now: DateTime<Utc>,
    ) -> LedgerFuture<'_, RetiredEvent> {
        Box::pin(async move {
            let started = Instant::now();
            let result = self
                .retire_one(event_id, None, retention, floor_micros(now))
                .await
                .and_then(|retired| retired.ok_or_else(|| LedgerError::not_found("event", event_id)));
            timed("retire", started);
            result
        })
    }

    fn event_seat(&self, id: EventSeatId) -> LedgerFuture<'_, EventSeatSnapshot> {
        Box::pin(async move { self.snapshot(id).await })
    }
}
