//! Domain types for seat inventory.
//!
//! Identifiers, the `Money` value object, catalog records (venues, seats,
//! events, customers) and the read-only views returned to callers.
//! The seat state machine itself lives in [`crate::seat`].

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::seat::SeatStatus;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(i64);

        impl $name {
            #[doc = concat!("Create a `", stringify!($name), "` from its database key")]
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the inner database key
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Unique identifier for a venue
    VenueId
);
id_type!(
    /// Unique identifier for a physical seat in a venue (reused across events)
    SeatId
);
id_type!(
    /// Unique identifier for a scheduled event
    EventId
);
id_type!(
    /// Unique identifier for a sellable (event, seat) pairing
    EventSeatId
);
id_type!(
    /// Unique identifier for a customer
    CustomerId
);
id_type!(
    /// Unique identifier for a ticket
    TicketId
);

// ============================================================================
// Money Value Object (integral minor units, no floating point)
// ============================================================================

/// Integral currency amount in minor units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Creates a `Money` value from minor units
    #[must_use]
    pub const fn from_minor(amount: u64) -> Self {
        Self(amount)
    }

    /// Returns the amount in minor units
    #[must_use]
    pub const fn minor(&self) -> u64 {
        self.0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Prices used when seeding an event's seats.
///
/// Every seat gets `default` unless its row has an override.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceList {
    default: Money,
    by_row: BTreeMap<String, Money>,
}

impl PriceList {
    /// Same price for every seat
    #[must_use]
    pub const fn flat(price: Money) -> Self {
        Self {
            default: price,
            by_row: BTreeMap::new(),
        }
    }

    /// Override the price for one row
    #[must_use]
    pub fn with_row(mut self, row: impl Into<String>, price: Money) -> Self {
        self.by_row.insert(row.into(), price);
        self
    }

    /// Price for a seat in `row`
    #[must_use]
    pub fn price_for(&self, row: &str) -> Money {
        self.by_row.get(row).copied().unwrap_or(self.default)
    }
}

// ============================================================================
// Catalog records
// ============================================================================

/// A venue owning a grid of physical seats.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Venue {
    /// Venue identifier
    pub id: VenueId,
    /// Unique venue name
    pub name: String,
    /// Optional street address
    pub address: Option<String>,
}

/// A physical seat, unique per (venue, row, number).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    /// Seat identifier
    pub id: SeatId,
    /// Owning venue
    pub venue_id: VenueId,
    /// Row name, e.g. "A"
    pub row: String,
    /// Position within the row
    pub number: i32,
}

impl Seat {
    /// Human-readable label, e.g. `A12`
    #[must_use]
    pub fn label(&self) -> String {
        seat_label(&self.row, self.number)
    }
}

/// Format a seat label from its row and number.
#[must_use]
pub fn seat_label(row: &str, number: i32) -> String {
    format!("{row}{number}")
}

/// A scheduled event that owns a set of event seats.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier
    pub id: EventId,
    /// Hosting venue
    pub venue_id: VenueId,
    /// Name, unique per venue
    pub name: String,
    /// Scheduled start; the event is retired once this has passed
    pub starts_at: DateTime<Utc>,
    /// Free-form description
    pub description: Option<String>,
}

/// Events split by whether their start time has passed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventSchedule {
    /// Events starting at or after `now`, earliest first
    pub upcoming: Vec<Event>,
    /// Events that started before `now`, earliest first
    pub past: Vec<Event>,
}

/// A buyer, unique by case-folded email.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Customer identifier
    pub id: CustomerId,
    /// Display name
    pub name: String,
    /// Trimmed, lower-cased email
    pub email: String,
    /// Optional phone number
    pub phone: Option<String>,
    /// When the record was created
    pub created_at: DateTime<Utc>,
}

/// Normalize an email for identity comparison.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ============================================================================
// Sales
// ============================================================================

/// Immutable sale receipt. At most one exists per event seat.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket identifier
    pub id: TicketId,
    /// Buyer
    pub customer_id: CustomerId,
    /// The seat that was sold
    pub event_seat_id: EventSeatId,
    /// Price copied from the event seat at sale time
    pub price: Money,
    /// Sale time, never changed afterwards
    pub purchased_at: DateTime<Utc>,
}

/// One successful settlement: the ticket plus the seat label for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoldSeat {
    /// The created ticket
    pub ticket: Ticket,
    /// Label of the sold seat, e.g. `A12`
    pub seat_label: String,
}

impl SoldSeat {
    /// Sum of the ticket prices, or `None` on overflow.
    #[must_use]
    pub fn total(sold: &[Self]) -> Option<Money> {
        sold.iter()
            .try_fold(Money::from_minor(0), |sum, s| sum.checked_add(s.ticket.price))
    }
}

/// A customer's ticket joined with its event and seat, for listings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketView {
    /// Ticket identifier
    pub ticket_id: TicketId,
    /// Event the ticket is for
    pub event_id: EventId,
    /// Event name
    pub event_name: String,
    /// Seat label
    pub seat_label: String,
    /// Price paid
    pub price: Money,
    /// Sale time
    pub purchased_at: DateTime<Utc>,
}

/// Read-only, possibly stale view of one event seat.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSeatSnapshot {
    /// Event seat identifier
    pub id: EventSeatId,
    /// Owning event
    pub event_id: EventId,
    /// Physical seat
    pub seat_id: SeatId,
    /// Seat label, e.g. `A12`
    pub seat_label: String,
    /// Current price
    pub price: Money,
    /// Stored status (may be an unswept expired hold)
    pub status: SeatStatus,
    /// Hold deadline when held
    pub held_until: Option<DateTime<Utc>>,
}

impl EventSeatSnapshot {
    /// Whether the seat could be held or sold at `now`, accounting for
    /// holds that have elapsed but not yet been swept.
    #[must_use]
    pub fn is_available_at(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            SeatStatus::Available => true,
            SeatStatus::Held => self.held_until.is_none_or(|until| until <= now),
            SeatStatus::Sold => false,
        }
    }
}

// ============================================================================
// Retirement
// ============================================================================

/// What happens to tickets when their event is retired.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketRetention {
    /// Tickets are deleted together with the event.
    #[default]
    Cascade,
    /// Tickets are copied to the archive before the event is deleted.
    Archive,
}

impl TicketRetention {
    /// Configuration string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cascade => "cascade",
            Self::Archive => "archive",
        }
    }
}

impl FromStr for TicketRetention {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cascade" => Ok(Self::Cascade),
            "archive" => Ok(Self::Archive),
            other => Err(format!("Invalid ticket retention: {other}")),
        }
    }
}

/// Summary of one retired event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetiredEvent {
    /// The deleted event
    pub event_id: EventId,
    /// Its name
    pub name: String,
    /// Its scheduled start
    pub starts_at: DateTime<Utc>,
    /// Event seats deleted with it
    pub seats_removed: u64,
    /// Tickets deleted with it
    pub tickets_removed: u64,
    /// Tickets copied to the archive first (zero under `Cascade`)
    pub tickets_archived: u64,
}

/// A ticket copied out of a retired event. Holds no references to live rows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedTicket {
    /// Original ticket identifier
    pub ticket_id: TicketId,
    /// Buyer
    pub customer_id: CustomerId,
    /// Retired event
    pub event_id: EventId,
    /// Event name at retirement
    pub event_name: String,
    /// Seat label
    pub seat_label: String,
    /// Price paid
    pub price: Money,
    /// Original sale time
    pub purchased_at: DateTime<Utc>,
    /// When the ticket was archived
    pub archived_at: DateTime<Utc>,
}

// ============================================================================
// Time
// ============================================================================

/// `9999-12-31T23:59:59Z`, inside the range of every ledger's timestamp type.
const LATEST_DEADLINE_SECS: i64 = 253_402_300_799;

/// Latest hold deadline a ledger accepts.
#[must_use]
pub fn latest_deadline() -> DateTime<Utc> {
    DateTime::from_timestamp(LATEST_DEADLINE_SECS, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Truncate to whole microseconds, the precision ledgers store.
#[must_use]
pub fn floor_micros(t: DateTime<Utc>) -> DateTime<Utc> {
    t.trunc_subsecs(6)
}

/// Round up to whole microseconds.
#[must_use]
pub fn ceil_micros(t: DateTime<Utc>) -> DateTime<Utc> {
    let floor = t.trunc_subsecs(6);
    if floor < t {
        floor
            .checked_add_signed(Duration::microseconds(1))
            .unwrap_or(floor)
    } else {
        floor
    }
}

/// Deadline `ttl` after `now`, rounded up to a storable microsecond.
///
/// Deadlines past [`latest_deadline`] (including arithmetic overflow) are
/// capped there; the flag reports whether that happened.
#[must_use]
pub fn hold_deadline(now: DateTime<Utc>, ttl: Duration) -> (DateTime<Utc>, bool) {
    let latest = latest_deadline();
    match now.checked_add_signed(ttl).filter(|d| *d <= latest) {
        Some(deadline) => (ceil_micros(deadline).min(latest), false),
        None => (latest, true),
    }
}
