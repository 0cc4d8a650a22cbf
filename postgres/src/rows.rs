//! Row decoding and column conversions.

use seat_inventory_core::seat::{EventSeat, SeatStatus};
use seat_inventory_core::types::{
    Customer, CustomerId, Event, EventId, EventSeatId, EventSeatSnapshot, Money, Seat, SeatId,
    Venue, VenueId, seat_label,
};
use seat_inventory_core::{LedgerError, Result};
use sqlx::Row;
use sqlx::postgres::PgRow;

use crate::error::ledger_error;

/// Columns selected for an event seat joined with its physical seat.
pub(crate) const EVENT_SEAT_COLUMNS: &str =
    "es.id, es.event_id, es.seat_id, es.status, es.price_minor, es.held_until, s.seat_row, s.number";

pub(crate) fn money(minor: i64) -> Result<Money> {
    u64::try_from(minor)
        .map(Money::from_minor)
        .map_err(|_| LedgerError::Database(format!("Negative price in ledger: {minor}")))
}

pub(crate) fn minor(price: Money) -> Result<i64> {
    i64::try_from(price.minor())
        .map_err(|_| LedgerError::InvalidInput(format!("Price out of range: {price}")))
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| ledger_error(&format!("Failed to decode column {column}"), e))
}

pub(crate) fn event_seat(row: &PgRow) -> Result<EventSeat> {
    let status: String = get(row, "status")?;
    Ok(EventSeat {
        id: EventSeatId::new(get(row, "id")?),
        event_id: EventId::new(get(row, "event_id")?),
        seat_id: SeatId::new(get(row, "seat_id")?),
        status: SeatStatus::parse(&status)?,
        price: money(get(row, "price_minor")?)?,
        held_until: get(row, "held_until")?,
    })
}

/// Label of the seat joined into an [`EVENT_SEAT_COLUMNS`] row.
pub(crate) fn label(row: &PgRow) -> Result<String> {
    let seat_row: String = get(row, "seat_row")?;
    Ok(seat_label(&seat_row, get(row, "number")?))
}

pub(crate) fn snapshot(row: &PgRow) -> Result<EventSeatSnapshot> {
    let seat = event_seat(row)?;
    Ok(EventSeatSnapshot {
        id: seat.id,
        event_id: seat.event_id,
        seat_id: seat.seat_id,
        seat_label: label(row)?,
        price: seat.price,
        status: seat.status,
        held_until: seat.held_until,
    })
}

pub(crate) fn venue(row: &PgRow) -> Result<Venue> {
    Ok(Venue {
        id: VenueId::new(get(row, "id")?),
        name: get(row, "name")?,
        address: get(row, "address")?,
    })
}

pub(crate) fn seat(row: &PgRow) -> Result<Seat> {
    Ok(Seat {
        id: SeatId::new(get(row, "id")?),
        venue_id: VenueId::new(get(row, "venue_id")?),
        row: get(row, "seat_row")?,
        number: get(row, "number")?,
    })
}

pub(crate) fn event(row: &PgRow) -> Result<Event> {
    Ok(Event {
        id: EventId::new(get(row, "id")?),
        venue_id: VenueId::new(get(row, "venue_id")?),
        name: get(row, "name")?,
        starts_at: get(row, "starts_at")?,
        description: get(row, "description")?,
    })
}

pub(crate) fn customer(row: &PgRow) -> Result<Customer> {
    Ok(Customer {
        id: CustomerId::new(get(row, "id")?),
        name: get(row, "name")?,
        email: get(row, "email")?,
        phone: get(row, "phone")?,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn ids<T: Copy>(ids: &[T], key: impl Fn(T) -> i64) -> Vec<i64> {
    ids.iter().copied().map(key).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[test]
    fn negative_price_is_rejected() {
        assert!(money(-1).is_err());
        assert_eq!(money(1250).unwrap(), Money::from_minor(1250));
    }

    #[test]
    fn oversized_price_cannot_be_stored() {
        assert!(minor(Money::from_minor(u64::MAX)).is_err());
        assert_eq!(minor(Money::from_minor(99)).unwrap(), 99);
    }
}
