//! Row acquisition for holds and settlements.
//!
//! There are two primitives and they are kept apart:
//!
//! - [`lock_hold_candidates`] never waits. Rows another transaction has
//!   locked are skipped (`FOR UPDATE SKIP LOCKED`), so concurrent buyers
//!   aiming at overlapping seats fail fast instead of queueing.
//! - [`lock_for_settlement`] waits (`FOR UPDATE`) for every requested row,
//!   taking locks in ascending id order so two settlements cannot deadlock.
//!
//! Both must run inside a transaction; the locks are released on commit or
//! rollback.

use chrono::{DateTime, Utc};
use seat_inventory_core::Result;
use seat_inventory_core::seat::EventSeat;
use seat_inventory_core::types::{EventId, EventSeatId, SeatId};
use sqlx::PgConnection;

use crate::error::ledger_error;
use crate::rows::{self, EVENT_SEAT_COLUMNS};

/// Lock the units of `event_id` on the requested seats that are available,
/// or logically available because their hold has elapsed at `now`.
///
/// Contended rows are silently left out. Result is ordered by seat id.
pub(crate) async fn lock_hold_candidates(
    conn: &mut PgConnection,
    event_id: EventId,
    seat_ids: &[SeatId],
    now: DateTime<Utc>,
) -> Result<Vec<EventSeat>> {
    let records = sqlx::query(
        r"
        SELECT id, event_id, seat_id, status, price_minor, held_until
        FROM event_seats
        WHERE event_id = $1
          AND seat_id = ANY($2)
          AND (status = 'AVAILABLE'
               OR (status = 'HELD' AND (held_until IS NULL OR held_until <= $3)))
        ORDER BY seat_id
        FOR UPDATE SKIP LOCKED
        ",
    )
    .bind(event_id.get())
    .bind(rows::ids(seat_ids, SeatId::get))
    .bind(now)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| ledger_error("Failed to lock hold candidates", e))?;

    records.iter().map(rows::event_seat).collect()
}

/// Lock the requested units of `event_id`, waiting for any concurrent
/// holder, and return them with their seat labels.
///
/// Ids that do not exist or belong to another event are not returned.
pub(crate) async fn lock_for_settlement(
    conn: &mut PgConnection,
    event_id: EventId,
    event_seat_ids: &[EventSeatId],
) -> Result<Vec<(EventSeat, String)>> {
    let sql = format!(
        r"
        SELECT {EVENT_SEAT_COLUMNS}
        FROM event_seats es
        JOIN seats s ON s.id = es.seat_id
        WHERE es.event_id = $1
          AND es.id = ANY($2)
        ORDER BY es.id
        FOR UPDATE OF es
        "
    );
    let records = sqlx::query(&sql)
        .bind(event_id.get())
        .bind(rows::ids(event_seat_ids, EventSeatId::get))
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| ledger_error("Failed to lock seats for settlement", e))?;

    records
        .iter()
        .map(|row| Ok((rows::event_seat(row)?, rows::label(row)?)))
        .collect()
}
