//! Storage traits for the inventory ledger.
//!
//! # Design
//!
//! The ledger is the only shared mutable resource. Each trait method is one
//! transaction scoped to one call: implementations acquire rows, run them
//! through the [`EventSeat`](crate::seat::EventSeat) state machine, write the
//! result and release everything before returning. No transaction outlives a
//! call.
//!
//! Two row-acquisition strategies back the operations:
//!
//! - **Skip-contended** (holds): rows another transaction has locked are
//!   treated as unavailable for this attempt. Never waits.
//! - **Exclusive** (settlement, sweeps, retirement): waits for the specific
//!   rows, locking them in ascending id order.
//!
//! # Implementations
//!
//! - `PostgresLedger` (in `seat-inventory-postgres`): `FOR UPDATE SKIP LOCKED`
//!   and `FOR UPDATE` on `PostgreSQL`
//! - `InMemoryLedger` (in `seat-inventory-testing`): per-row async locks
//!
//! # Dyn Compatibility
//!
//! Methods return boxed futures so components can hold `Arc<dyn InventoryLedger>`.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::seat::SeatStatus;
use crate::types::{
    Customer, CustomerId, Event, EventId, EventSchedule, EventSeatId, EventSeatSnapshot, PriceList,
    RetiredEvent, Seat, SeatId, SoldSeat, TicketRetention, TicketView, Venue, VenueId,
};

/// Boxed future returned by ledger methods.
pub type LedgerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Transactional operations on event seats and tickets.
pub trait InventoryLedger: Send + Sync {
    /// Hold the requested seats of `event_id` until `held_until`.
    ///
    /// In one transaction: lock candidate rows (available, or held with an
    /// elapsed deadline at `now`) skipping rows locked elsewhere, normalize
    /// them, and hold them. Returns the ids actually held, ordered by seat id.
    /// Seats that are sold, actively held, contended or unknown are absent.
    ///
    /// # Errors
    ///
    /// Only infrastructure failures; see [`LedgerError`](crate::LedgerError).
    fn hold_seats(
        &self,
        event_id: EventId,
        seat_ids: Vec<SeatId>,
        held_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> LedgerFuture<'_, Vec<EventSeatId>>;

    /// Sell the given event seats to `customer_id`.
    ///
    /// In one transaction: lock the rows exclusively (waiting if needed),
    /// then walk `event_seat_ids` in caller order, normalizing each seat and
    /// selling it when eligible. Exactly one ticket is created per sold seat.
    /// Unknown ids, ids of other events and unsellable seats are skipped.
    ///
    /// # Errors
    ///
    /// Only infrastructure failures; see [`LedgerError`](crate::LedgerError).
    fn settle_seats(
        &self,
        event_id: EventId,
        event_seat_ids: Vec<EventSeatId>,
        customer_id: CustomerId,
        now: DateTime<Utc>,
    ) -> LedgerFuture<'_, Vec<SoldSeat>>;

    /// Return every seat held with a deadline at or before `now` (or none) to
    /// `AVAILABLE`. Returns the number of seats reclaimed.
    ///
    /// # Errors
    ///
    /// Only infrastructure failures; see [`LedgerError`](crate::LedgerError).
    fn reclaim_expired(&self, now: DateTime<Utc>) -> LedgerFuture<'_, u64>;

    /// Delete every event that started before `cutoff`, together with its
    /// event seats and tickets. Under [`TicketRetention::Archive`] tickets are
    /// archived in the same transaction first.
    ///
    /// # Errors
    ///
    /// Only infrastructure failures; see [`LedgerError`](crate::LedgerError).
    fn retire_events_before(
        &self,
        cutoff: DateTime<Utc>,
        retention: TicketRetention,
    ) -> LedgerFuture<'_, Vec<RetiredEvent>>;

    /// Delete one event regardless of its start time, applying `retention`
    /// exactly as [`retire_events_before`](Self::retire_events_before) does.
    /// Archived tickets are stamped with `now`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`](crate::LedgerError::NotFound) if the
    /// event does not exist.
    fn retire_event(
        &self,
        event_id: EventId,
        retention: TicketRetention,
        now: DateTime<Utc>,
    ) -> LedgerFuture<'_, RetiredEvent>;

    /// Read-only snapshot of one event seat.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`](crate::LedgerError::NotFound) if the
    /// event seat does not exist.
    fn event_seat(&self, id: EventSeatId) -> LedgerFuture<'_, EventSeatSnapshot>;
}

/// Keyed catalog records the inventory core depends on.
///
/// These are simple create-if-missing records with no concurrency hazard
/// beyond the uniqueness constraints they are keyed on.
pub trait Catalog: Send + Sync {
    /// Find a venue by name or create it.
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails.
    fn ensure_venue(&self, name: String, address: Option<String>) -> LedgerFuture<'_, Venue>;

    /// All venues, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    fn list_venues(&self) -> LedgerFuture<'_, Vec<Venue>>;

    /// Physical seats of a venue, ordered by (row, number).
    /// An unknown venue yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    fn list_seats_for_venue(&self, venue_id: VenueId) -> LedgerFuture<'_, Vec<Seat>>;

    /// Events hosted by a venue, earliest first.
    /// An unknown venue yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    fn list_events_for_venue(&self, venue_id: VenueId) -> LedgerFuture<'_, Vec<Event>>;

    /// Create every missing `(row, number)` seat of the grid.
    /// Returns how many seats were created.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`](crate::LedgerError::NotFound) for an
    /// unknown venue, or error if the database operation fails.
    fn ensure_seat_grid(
        &self,
        venue_id: VenueId,
        rows: Vec<String>,
        numbers: Vec<i32>,
    ) -> LedgerFuture<'_, u64>;

    /// Find an event by (venue, name) or create it.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`](crate::LedgerError::NotFound) for an
    /// unknown venue, or error if the database operation fails.
    fn resolve_or_create_event(
        &self,
        venue_id: VenueId,
        name: String,
        starts_at: DateTime<Utc>,
        description: Option<String>,
    ) -> LedgerFuture<'_, Event>;

    /// Find a customer by case-folded email or create one. Name and phone of
    /// an existing customer are updated when new non-empty values differ.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidInput`](crate::LedgerError::InvalidInput)
    /// for an empty email, or error if the database operation fails.
    fn resolve_or_create_customer(
        &self,
        name: String,
        email: String,
        phone: Option<String>,
    ) -> LedgerFuture<'_, Customer>;

    /// Create available event seats for the venue's seats in (row, number)
    /// order, limited to `seat_limit` seats, skipping seats already seeded.
    /// Returns how many event seats were created.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`](crate::LedgerError::NotFound) for an
    /// unknown event, or error if the database operation fails.
    fn seed_event_seats(
        &self,
        event_id: EventId,
        prices: PriceList,
        seat_limit: Option<usize>,
    ) -> LedgerFuture<'_, u64>;

    /// Event seats with the given stored status, ordered by (row, number).
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    fn list_event_seats(
        &self,
        event_id: EventId,
        status: SeatStatus,
        limit: Option<usize>,
    ) -> LedgerFuture<'_, Vec<EventSeatSnapshot>>;

    /// All events split into upcoming and past relative to `now`.
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    fn events_by_schedule(&self, now: DateTime<Utc>) -> LedgerFuture<'_, EventSchedule>;

    /// Tickets bought by the customer with this email, newest first.
    /// An unknown email yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    fn tickets_for_customer(&self, email: String) -> LedgerFuture<'_, Vec<TicketView>>;
}
