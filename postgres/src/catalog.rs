//! [`Catalog`] over `PostgreSQL`: create-if-missing records and read views.

use chrono::{DateTime, Utc};
use seat_inventory_core::ledger::{Catalog, LedgerFuture};
use seat_inventory_core::seat::SeatStatus;
use seat_inventory_core::types::{
    Customer, Event, EventId, EventSchedule, EventSeatSnapshot, PriceList, Seat, TicketId,
    TicketView, Venue, VenueId, normalize_email, seat_label,
};
use seat_inventory_core::{LedgerError, Result};
use sqlx::Row;

use crate::error::ledger_error;
use crate::ledger::PostgresLedger;
use crate::rows::{self, EVENT_SEAT_COLUMNS};

const EVENT_COLUMNS: &str = "id, venue_id, name, starts_at, description";

impl PostgresLedger {
    async fn require_venue(&self, venue_id: VenueId) -> Result<()> {
        sqlx::query("SELECT 1 FROM venues WHERE id = $1")
            .bind(venue_id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ledger_error("Failed to load venue", e))?
            .map(|_| ())
            .ok_or_else(|| LedgerError::not_found("venue", venue_id))
    }

    async fn find_event(&self, venue_id: VenueId, name: &str) -> Result<Option<Event>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE venue_id = $1 AND name = $2");
        sqlx::query(&sql)
            .bind(venue_id.get())
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ledger_error("Failed to load event", e))?
            .as_ref()
            .map(rows::event)
            .transpose()
    }
}

impl Catalog for PostgresLedger {
    fn ensure_venue(&self, name: String, address: Option<String>) -> LedgerFuture<'_, Venue> {
        Box::pin(async move {
            let row = sqlx::query(
                r"
                INSERT INTO venues (name, address)
                VALUES ($1, $2)
                ON CONFLICT (name) DO UPDATE
                    SET address = COALESCE(EXCLUDED.address, venues.address)
                RETURNING id, name, address
                ",
            )
            .bind(&name)
            .bind(&address)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ledger_error("Failed to ensure venue", e))?;

            rows::venue(&row)
        })
    }

    fn list_venues(&self) -> LedgerFuture<'_, Vec<Venue>> {
        Box::pin(async move {
            sqlx::query("SELECT id, name, address FROM venues ORDER BY name")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| ledger_error("Failed to list venues", e))?
                .iter()
                .map(rows::venue)
                .collect()
        })
    }

    fn list_seats_for_venue(&self, venue_id: VenueId) -> LedgerFuture<'_, Vec<Seat>> {
        Box::pin(async move {
            sqlx::query(
                "SELECT id, venue_id, seat_row, number FROM seats WHERE venue_id = $1 ORDER BY seat_row, number",
            )
            .bind(venue_id.get())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ledger_error("Failed to list seats", e))?
            .iter()
            .map(rows::seat)
            .collect()
        })
    }

    fn list_events_for_venue(&self, venue_id: VenueId) -> LedgerFuture<'_, Vec<Event>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {EVENT_COLUMNS} FROM events WHERE venue_id = $1 ORDER BY starts_at, id"
            );
            sqlx::query(&sql)
                .bind(venue_id.get())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| ledger_error("Failed to list events", e))?
                .iter()
                .map(rows::event)
                .collect()
        })
    }

    fn ensure_seat_grid(
        &self,
        venue_id: VenueId,
        rows: Vec<String>,
        numbers: Vec<i32>,
    ) -> LedgerFuture<'_, u64> {
        Box::pin(async move {
            self.require_venue(venue_id).await?;
            if rows.is_empty() || numbers.is_empty() {
                return Ok(0);
            }

            let result = sqlx::query(
                r"
                INSERT INTO seats (venue_id, seat_row, number)
                SELECT $1, r, n
                FROM UNNEST($2::text[]) AS r
                CROSS JOIN UNNEST($3::int[]) AS n
                ON CONFLICT (venue_id, seat_row, number) DO NOTHING
                ",
            )
            .bind(venue_id.get())
            .bind(&rows)
            .bind(&numbers)
            .execute(&self.pool)
            .await
            .map_err(|e| ledger_error("Failed to create seats", e))?;

            Ok(result.rows_affected())
        })
    }

    fn resolve_or_create_event(
        &self,
        venue_id: VenueId,
        name: String,
        starts_at: DateTime<Utc>,
        description: Option<String>,
    ) -> LedgerFuture<'_, Event> {
        Box::pin(async move {
            self.require_venue(venue_id).await?;
            if let Some(event) = self.find_event(venue_id, &name).await? {
                return Ok(event);
            }

            let sql = format!(
                r"
                INSERT INTO events (venue_id, name, starts_at, description)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (venue_id, name) DO NOTHING
                RETURNING {EVENT_COLUMNS}
                "
            );
            let inserted = sqlx::query(&sql)
                .bind(venue_id.get())
                .bind(&name)
                .bind(starts_at)
                .bind(&description)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| ledger_error("Failed to create event", e))?;

            match inserted {
                Some(row) => rows::event(&row),
                // Lost a race with a concurrent creator.
                None => self
                    .find_event(venue_id, &name)
                    .await?
                    .ok_or_else(|| LedgerError::not_found("event", &name)),
            }
        })
    }

    fn resolve_or_create_customer(
        &self,
        name: String,
        email: String,
        phone: Option<String>,
    ) -> LedgerFuture<'_, Customer> {
        Box::pin(async move {
            let email = normalize_email(&email);
            if email.is_empty() {
                return Err(LedgerError::InvalidInput("customer email is empty".into()));
            }

            let row = sqlx::query(
                r"
                INSERT INTO customers (name, email, phone)
                VALUES ($1, $2, $3)
                ON CONFLICT (email) DO UPDATE
                    SET name = CASE WHEN EXCLUDED.name <> '' THEN EXCLUDED.name ELSE customers.name END,
                        phone = COALESCE(NULLIF(EXCLUDED.phone, ''), customers.phone)
                RETURNING id, name, email, phone, created_at
                ",
            )
            .bind(&name)
            .bind(&email)
            .bind(&phone)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ledger_error("Failed to resolve customer", e))?;

            rows::customer(&row)
        })
    }

    fn seed_event_seats(
        &self,
        event_id: EventId,
        prices: PriceList,
        seat_limit: Option<usize>,
    ) -> LedgerFuture<'_, u64> {
        Box::pin(async move {
            let venue_id: i64 = sqlx::query_scalar("SELECT venue_id FROM events WHERE id = $1")
                .bind(event_id.get())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| ledger_error("Failed to load event", e))?
                .ok_or_else(|| LedgerError::not_found("event", event_id))?;

            let seats = sqlx::query(
                "SELECT id, seat_row FROM seats WHERE venue_id = $1 ORDER BY seat_row, number",
            )
            .bind(venue_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ledger_error("Failed to load seats", e))?;

            let mut seat_ids = Vec::with_capacity(seats.len());
            let mut price_minor = Vec::with_capacity(seats.len());
            for row in seats.iter().take(seat_limit.unwrap_or(usize::MAX)) {
                let decode = |e| ledger_error("Failed to decode seat", e);
                let seat_row: String = row.try_get("seat_row").map_err(decode)?;
                seat_ids.push(row.try_get::<i64, _>("id").map_err(decode)?);
                price_minor.push(rows::minor(prices.price_for(&seat_row))?);
            }
            if seat_ids.is_empty() {
                return Ok(0);
            }

            let result = sqlx::query(
                r"
                INSERT INTO event_seats (event_id, seat_id, status, price_minor)
                SELECT $1, seat_id, 'AVAILABLE', price_minor
                FROM UNNEST($2::bigint[], $3::bigint[]) AS t(seat_id, price_minor)
                ON CONFLICT (event_id, seat_id) DO NOTHING
                ",
            )
            .bind(event_id.get())
            .bind(&seat_ids)
            .bind(&price_minor)
            .execute(&self.pool)
            .await
            .map_err(|e| ledger_error("Failed to seed event seats", e))?;

            Ok(result.rows_affected())
        })
    }

    fn list_event_seats(
        &self,
        event_id: EventId,
        status: SeatStatus,
        limit: Option<usize>,
    ) -> LedgerFuture<'_, Vec<EventSeatSnapshot>> {
        Box::pin(async move {
            let limit = limit.map(|n| i64::try_from(n).unwrap_or(i64::MAX));
            let sql = format!(
                r"
                SELECT {EVENT_SEAT_COLUMNS}
                FROM event_seats es
                JOIN seats s ON s.id = es.seat_id
                WHERE es.event_id = $1 AND es.status = $2
                ORDER BY s.seat_row, s.number
                LIMIT $3
                "
            );
            let records = sqlx::query(&sql)
                .bind(event_id.get())
                .bind(status.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| ledger_error("Failed to list event seats", e))?;

            records.iter().map(rows::snapshot).collect()
        })
    }

    fn events_by_schedule(&self, now: DateTime<Utc>) -> LedgerFuture<'_, EventSchedule> {
        Box::pin(async move {
            let sql = format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY starts_at, id");
            let records = sqlx::query(&sql)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| ledger_error("Failed to list events", e))?;

            let events = records.iter().map(rows::event).collect::<Result<Vec<_>>>()?;
            let (past, upcoming) = events.into_iter().partition(|e| e.starts_at < now);
            Ok(EventSchedule { upcoming, past })
        })
    }

    fn tickets_for_customer(&self, email: String) -> LedgerFuture<'_, Vec<TicketView>> {
        Box::pin(async move {
            let records = sqlx::query(
                r"
                SELECT t.id, e.id AS event_id, e.name AS event_name, s.seat_row, s.number,
                       t.price_minor, t.purchased_at
                FROM tickets t
                JOIN customers c ON c.id = t.customer_id
                JOIN event_seats es ON es.id = t.event_seat_id
                JOIN events e ON e.id = es.event_id
                JOIN seats s ON s.id = es.seat_id
                WHERE c.email = $1
                ORDER BY t.purchased_at DESC, t.id DESC
                ",
            )
            .bind(normalize_email(&email))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ledger_error("Failed to list tickets", e))?;

            records
                .iter()
                .map(|row| {
                    let decode = |e| ledger_error("Failed to decode ticket", e);
                    let seat_row: String = row.try_get("seat_row").map_err(decode)?;
                    Ok(TicketView {
                        ticket_id: TicketId::new(row.try_get("id").map_err(decode)?),
                        event_id: EventId::new(row.try_get("event_id").map_err(decode)?),
                        event_name: row.try_get("event_name").map_err(decode)?,
                        seat_label: seat_label(&seat_row, row.try_get("number").map_err(decode)?),
                        price: rows::money(row.try_get("price_minor").map_err(decode)?)?,
                        purchased_at: row.try_get("purchased_at").map_err(decode)?,
                    })
                })
                .collect()
        })
    }
}
