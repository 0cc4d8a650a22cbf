//! In-memory ledger for tests.
//!
//! Rows live behind one short-lived state mutex; each event seat also has its
//! own async row lock that stands in for a database row lock. Holds take row
//! locks with `try_lock` and skip what they cannot get, settlement and the
//! sweeps wait for them in ascending id order. [`InMemoryLedger::lock_seat`]
//! lets a test play "another transaction" holding a row.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use seat_inventory_core::error::{LedgerError, Result};
use seat_inventory_core::ledger::{Catalog, InventoryLedger, LedgerFuture};
use seat_inventory_core::seat::{EventSeat, SeatStatus};
use seat_inventory_core::types::{
    ArchivedTicket, Customer, CustomerId, Event, EventId, EventSchedule, EventSeatId,
    EventSeatSnapshot, PriceList, RetiredEvent, Seat, SeatId, SoldSeat, Ticket, TicketId,
    TicketRetention, TicketView, Venue, VenueId, normalize_email,
};

#[derive(Debug, Default)]
struct LedgerState {
    next_id: i64,
    venues: BTreeMap<VenueId, Venue>,
    seats: BTreeMap<SeatId, Seat>,
    events: BTreeMap<EventId, Event>,
    event_seats: BTreeMap<EventSeatId, EventSeat>,
    customers: BTreeMap<CustomerId, Customer>,
    tickets: BTreeMap<TicketId, Ticket>,
    archived: Vec<ArchivedTicket>,
}

impl LedgerState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn label_of(&self, seat_id: SeatId) -> String {
        self.seats
            .get(&seat_id)
            .map_or_else(|| format!("seat#{seat_id}"), Seat::label)
    }

    fn snapshot(&self, seat: &EventSeat) -> EventSeatSnapshot {
        EventSeatSnapshot {
            id: seat.id,
            event_id: seat.event_id,
            seat_id: seat.seat_id,
            seat_label: self.label_of(seat.seat_id),
            price: seat.price,
            status: seat.status,
            held_until: seat.held_until,
        }
    }

    /// (row, number) sort key of a physical seat.
    fn position(&self, seat_id: SeatId) -> (String, i32) {
        self.seats
            .get(&seat_id)
            .map_or_else(|| (String::new(), 0), |s| (s.row.clone(), s.number))
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<LedgerState>,
    row_locks: Mutex<HashMap<EventSeatId, Arc<RowLock<()>>>>,
}

/// In-process [`InventoryLedger`] and [`Catalog`].
///
/// Cloning is cheap; clones share the same rows.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    inner: Arc<Inner>,
}

impl InMemoryLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn row_lock(&self, id: EventSeatId) -> Arc<RowLock<()>> {
        let mut locks = self
            .inner
            .row_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(id).or_default())
    }

    /// Wait for the row locks of `ids`, in ascending id order.
    async fn lock_rows(&self, ids: &BTreeSet<EventSeatId>) -> Vec<OwnedMutexGuard<()>> {
        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            guards.push(self.row_lock(*id).lock_owned().await);
        }
        guards
    }

    /// Delete one event with its seats and tickets, archiving first under
    /// [`TicketRetention::Archive`].
    async fn retire_one(
        &self,
        event: Event,
        retention: TicketRetention,
        archived_at: DateTime<Utc>,
    ) -> RetiredEvent {
        let rows: BTreeSet<EventSeatId> = self
            .state()
            .event_seats
            .values()
            .filter(|s| s.event_id == event.id)
            .map(|s| s.id)
            .collect();
        let guards = self.lock_rows(&rows).await;

        let mut state = self.state();
        let doomed: Vec<Ticket> = state
            .tickets
            .values()
            .filter(|t| rows.contains(&t.event_seat_id))
            .cloned()
            .collect();

        let mut tickets_archived: u64 = 0;
        if retention == TicketRetention::Archive {
            for ticket in &doomed {
                let seat_label = state
                    .event_seats
                    .get(&ticket.event_seat_id)
                    .map_or_else(String::new, |s| state.label_of(s.seat_id));
                state.archived.push(ArchivedTicket {
                    ticket_id: ticket.id,
                    customer_id: ticket.customer_id,
                    event_id: event.id,
                    event_name: event.name.clone(),
                    seat_label,
                    price: ticket.price,
                    purchased_at: ticket.purchased_at,
                    archived_at,
                });
                tickets_archived += 1;
            }
        }

        for ticket in &doomed {
            state.tickets.remove(&ticket.id);
        }
        let mut seats_removed: u64 = 0;
        for id in &rows {
            if state.event_seats.remove(id).is_some() {
                seats_removed += 1;
            }
        }
        state.events.remove(&event.id);
        drop(state);
        drop(guards);

        let mut locks = self
            .inner
            .row_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.retain(|id, _| !rows.contains(id));
        drop(locks);

        RetiredEvent {
            event_id: event.id,
            name: event.name,
            starts_at: event.starts_at,
            seats_removed,
            tickets_removed: doomed.len() as u64,
            tickets_archived,
        }
    }

    /// Hold the row lock of one event seat, as a concurrent transaction would.
    ///
    /// Holds skip the seat and settlements wait until the guard is dropped.
    pub async fn lock_seat(&self, id: EventSeatId) -> OwnedMutexGuard<()> {
        self.row_lock(id).lock_owned().await
    }

    /// Overwrite a seat's stored state, bypassing every rule.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`] when the seat does not exist.
    pub fn force_seat_state(
        &self,
        id: EventSeatId,
        status: SeatStatus,
        held_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut state = self.state();
        let seat = state
            .event_seats
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("event seat", id))?;
        seat.status = status;
        seat.held_until = held_until;
        Ok(())
    }

    /// Tickets ever issued for one event seat.
    #[must_use]
    pub fn tickets_for_event_seat(&self, id: EventSeatId) -> Vec<Ticket> {
        self.state()
            .tickets
            .values()
            .filter(|t| t.event_seat_id == id)
            .cloned()
            .collect()
    }

    /// Number of live tickets.
    #[must_use]
    pub fn ticket_count(&self) -> usize {
        self.state().tickets.len()
    }

    /// Number of live event seats across all events.
    #[must_use]
    pub fn event_seat_count(&self) -> usize {
        self.state().event_seats.len()
    }

    /// Tickets archived when their event was retired.
    #[must_use]
    pub fn archived_tickets(&self) -> Vec<ArchivedTicket> {
        self.state().archived.clone()
    }
}

impl InventoryLedger for InMemoryLedger {
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
            let wanted: HashSet<SeatId> = seat_ids.into_iter().collect();

            let mut candidates: Vec<(SeatId, EventSeatId)> = {
                let state = self.state();
                state
                    .event_seats
                    .values()
                    .filter(|s| s.event_id == event_id && wanted.contains(&s.seat_id))
                    .filter(|s| s.status != SeatStatus::Sold && !s.has_active_hold(now))
                    .map(|s| (s.seat_id, s.id))
                    .collect()
            };
            candidates.sort_unstable();

            // Skip rows another transaction is holding.
            let mut guards = Vec::with_capacity(candidates.len());
            let mut locked = Vec::with_capacity(candidates.len());
            for (_, id) in candidates {
                if let Ok(guard) = self.row_lock(id).try_lock_owned() {
                    guards.push(guard);
                    locked.push(id);
                }
            }

            let mut state = self.state();
            let held: Vec<EventSeatId> = locked
                .into_iter()
                .filter(|id| {
                    state
                        .event_seats
                        .get_mut(id)
                        .is_some_and(|seat| seat.try_hold(held_until, now))
                })
                .collect();
            drop(state);
            drop(guards);
            Ok(held)
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

            let to_lock: BTreeSet<EventSeatId> = {
                let state = self.state();
                if !state.customers.contains_key(&customer_id) {
                    return Err(LedgerError::not_found("customer", customer_id));
                }
                event_seat_ids
                    .iter()
                    .filter(|id| {
                        state
                            .event_seats
                            .get(id)
                            .is_some_and(|s| s.event_id == event_id)
                    })
                    .copied()
                    .collect()
            };
            let guards = self.lock_rows(&to_lock).await;

            let mut state = self.state();
            let mut seen = HashSet::with_capacity(event_seat_ids.len());
            let mut sold = Vec::new();
            for id in event_seat_ids {
                if !to_lock.contains(&id) || !seen.insert(id) {
                    continue;
                }
                // Deleted while we waited for the lock.
                let Some(seat) = state.event_seats.get_mut(&id) else {
                    continue;
                };
                if !seat.try_sell(now) {
                    continue;
                }
                let (price, seat_id) = (seat.price, seat.seat_id);
                if state.tickets.values().any(|t| t.event_seat_id == id) {
                    return Err(LedgerError::Database(format!(
                        "duplicate ticket for event seat {id}"
                    )));
                }
                let ticket = Ticket {
                    id: TicketId::new(state.next_id()),
                    customer_id,
                    event_seat_id: id,
                    price,
                    purchased_at: now,
                };
                state.tickets.insert(ticket.id, ticket.clone());
                sold.push(SoldSeat {
                    ticket,
                    seat_label: state.label_of(seat_id),
                });
            }
            drop(state);
            drop(guards);
            Ok(sold)
        })
    }

    fn reclaim_expired(&self, now: DateTime<Utc>) -> LedgerFuture<'_, u64> {
        Box::pin(async move {
            let expired: BTreeSet<EventSeatId> = self
                .state()
                .event_seats
                .values()
                .filter(|s| s.status == SeatStatus::Held && !s.has_active_hold(now))
                .map(|s| s.id)
                .collect();
            if expired.is_empty() {
                return Ok(0);
            }
            let guards = self.lock_rows(&expired).await;

            let mut state = self.state();
            let mut reclaimed: u64 = 0;
            for id in &expired {
                if let Some(seat) = state.event_seats.get_mut(id) {
                    if seat.normalize(now) {
                        reclaimed += 1;
                    }
                }
            }
            drop(state);
            drop(guards);
            Ok(reclaimed)
        })
    }

    fn retire_events_before(
        &self,
        cutoff: DateTime<Utc>,
        retention: TicketRetention,
    ) -> LedgerFuture<'_, Vec<RetiredEvent>> {
        Box::pin(async move {
            let mut past: Vec<Event> = self
                .state()
                .events
                .values()
                .filter(|e| e.starts_at < cutoff)
                .cloned()
                .collect();
            past.sort_by_key(|e| (e.starts_at, e.id));

            let mut retired = Vec::with_capacity(past.len());
            for event in past {
                retired.push(self.retire_one(event, retention, cutoff).await);
            }
            Ok(retired)
        })
    }

    fn retire_event(
        &self,
        event_id: EventId,
        retention: TicketRetention,
        now: DateTime<Utc>,
    ) -> LedgerFuture<'_, RetiredEvent> {
        Box::pin(async move {
            let event = self
                .state()
                .events
                .get(&event_id)
                .cloned()
                .ok_or_else(|| LedgerError::not_found("event", event_id))?;
            Ok(self.retire_one(event, retention, now).await)
        })
    }

    fn event_seat(&self, id: EventSeatId) -> LedgerFuture<'_, EventSeatSnapshot> {
        Box::pin(async move {
            let state = self.state();
            state
                .event_seats
                .get(&id)
                .map(|seat| state.snapshot(seat))
                .ok_or_else(|| LedgerError::not_found("event seat", id))
        })
    }
}

impl Catalog for InMemoryLedger {
    fn ensure_venue(&self, name: String, address: Option<String>) -> LedgerFuture<'_, Venue> {
        Box::pin(async move {
            let mut state = self.state();
            if let Some(venue) = state.venues.values_mut().find(|v| v.name == name) {
                if address.is_some() {
                    venue.address = address;
                }
                return Ok(venue.clone());
            }
            let venue = Venue {
                id: VenueId::new(state.next_id()),
                name,
                address,
            };
            state.venues.insert(venue.id, venue.clone());
            Ok(venue)
        })
    }

    fn list_venues(&self) -> LedgerFuture<'_, Vec<Venue>> {
        Box::pin(async move {
            let mut venues: Vec<Venue> = self.state().venues.values().cloned().collect();
            venues.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(venues)
        })
    }

    fn list_seats_for_venue(&self, venue_id: VenueId) -> LedgerFuture<'_, Vec<Seat>> {
        Box::pin(async move {
            let mut seats: Vec<Seat> = self
                .state()
                .seats
                .values()
                .filter(|s| s.venue_id == venue_id)
                .cloned()
                .collect();
            seats.sort_by(|a, b| (&a.row, a.number).cmp(&(&b.row, b.number)));
            Ok(seats)
        })
    }

    fn list_events_for_venue(&self, venue_id: VenueId) -> LedgerFuture<'_, Vec<Event>> {
        Box::pin(async move {
            let mut events: Vec<Event> = self
                .state()
                .events
                .values()
                .filter(|e| e.venue_id == venue_id)
                .cloned()
                .collect();
            events.sort_by_key(|e| (e.starts_at, e.id));
            Ok(events)
        })
    }

    fn ensure_seat_grid(
        &self,
        venue_id: VenueId,
        rows: Vec<String>,
        numbers: Vec<i32>,
    ) -> LedgerFuture<'_, u64> {
        Box::pin(async move {
            let mut state = self.state();
            if !state.venues.contains_key(&venue_id) {
                return Err(LedgerError::not_found("venue", venue_id));
            }
            let existing: HashSet<(String, i32)> = state
                .seats
                .values()
                .filter(|s| s.venue_id == venue_id)
                .map(|s| (s.row.clone(), s.number))
                .collect();

            let mut created: u64 = 0;
            for row in &rows {
                for &number in &numbers {
                    if existing.contains(&(row.clone(), number)) {
                        continue;
                    }
                    let seat = Seat {
                        id: SeatId::new(state.next_id()),
                        venue_id,
                        row: row.clone(),
                        number,
                    };
                    state.seats.insert(seat.id, seat);
                    created += 1;
                }
            }
            Ok(created)
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
            let mut state = self.state();
            if !state.venues.contains_key(&venue_id) {
                return Err(LedgerError::not_found("venue", venue_id));
            }
            if let Some(event) = state
                .events
                .values()
                .find(|e| e.venue_id == venue_id && e.name == name)
            {
                return Ok(event.clone());
            }
            let event = Event {
                id: EventId::new(state.next_id()),
                venue_id,
                name,
                starts_at,
                description,
            };
            state.events.insert(event.id, event.clone());
            Ok(event)
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
            let mut state = self.state();
            if let Some(customer) = state.customers.values_mut().find(|c| c.email == email) {
                if !name.is_empty() && customer.name != name {
                    customer.name = name;
                }
                if let Some(phone) = phone.filter(|p| !p.is_empty()) {
                    customer.phone = Some(phone);
                }
                return Ok(customer.clone());
            }
            let customer = Customer {
                id: CustomerId::new(state.next_id()),
                name,
                email,
                phone,
                created_at: Utc::now(),
            };
            state.customers.insert(customer.id, customer.clone());
            Ok(customer)
        })
    }

    fn seed_event_seats(
        &self,
        event_id: EventId,
        prices: PriceList,
        seat_limit: Option<usize>,
    ) -> LedgerFuture<'_, u64> {
        Box::pin(async move {
            let mut state = self.state();
            let venue_id = state
                .events
                .get(&event_id)
                .map(|e| e.venue_id)
                .ok_or_else(|| LedgerError::not_found("event", event_id))?;

            let mut seats: Vec<Seat> = state
                .seats
                .values()
                .filter(|s| s.venue_id == venue_id)
                .cloned()
                .collect();
            seats.sort_by(|a, b| (&a.row, a.number).cmp(&(&b.row, b.number)));
            if let Some(limit) = seat_limit {
                seats.truncate(limit);
            }

            let seeded: HashSet<SeatId> = state
                .event_seats
                .values()
                .filter(|s| s.event_id == event_id)
                .map(|s| s.seat_id)
                .collect();

            let mut created: u64 = 0;
            for seat in seats.iter().filter(|s| !seeded.contains(&s.id)) {
                let id = EventSeatId::new(state.next_id());
                state.event_seats.insert(
                    id,
                    EventSeat::available(id, event_id, seat.id, prices.price_for(&seat.row)),
                );
                created += 1;
            }
            Ok(created)
        })
    }

    fn list_event_seats(
        &self,
        event_id: EventId,
        status: SeatStatus,
        limit: Option<usize>,
    ) -> LedgerFuture<'_, Vec<EventSeatSnapshot>> {
        Box::pin(async move {
            let state = self.state();
            let mut seats: Vec<&EventSeat> = state
                .event_seats
                .values()
                .filter(|s| s.event_id == event_id && s.status == status)
                .collect();
            seats.sort_by_cached_key(|s| state.position(s.seat_id));
            Ok(seats
                .into_iter()
                .take(limit.unwrap_or(usize::MAX))
                .map(|s| state.snapshot(s))
                .collect())
        })
    }

    fn events_by_schedule(&self, now: DateTime<Utc>) -> LedgerFuture<'_, EventSchedule> {
        Box::pin(async move {
            let state = self.state();
            let mut events: Vec<Event> = state.events.values().cloned().collect();
            events.sort_by_key(|e| (e.starts_at, e.id));
            let (past, upcoming) = events.into_iter().partition(|e| e.starts_at < now);
            Ok(EventSchedule { upcoming, past })
        })
    }

    fn tickets_for_customer(&self, email: String) -> LedgerFuture<'_, Vec<TicketView>> {
        Box::pin(async move {
            let email = normalize_email(&email);
            let state = self.state();
            let Some(customer) = state.customers.values().find(|c| c.email == email) else {
                return Ok(Vec::new());
            };

            let mut views: Vec<TicketView> = state
                .tickets
                .values()
                .filter(|t| t.customer_id == customer.id)
                .filter_map(|t| {
                    let seat = state.event_seats.get(&t.event_seat_id)?;
                    let event = state.events.get(&seat.event_id)?;
                    Some(TicketView {
                        ticket_id: t.id,
                        event_id: event.id,
                        event_name: event.name.clone(),
                        seat_label: state.label_of(seat.seat_id),
                        price: t.price,
                        purchased_at: t.purchased_at,
                    })
                })
                .collect();
            views.sort_by(|a, b| b.purchased_at.cmp(&a.purchased_at).then(b.ticket_id.cmp(&a.ticket_id)));
            Ok(views)
        })
    }
}
