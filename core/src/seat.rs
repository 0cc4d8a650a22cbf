//! The event seat state machine.
//!
//! Every ledger implementation loads the locked rows into [`EventSeat`] values
//! and drives them through the methods here, so the expiry rule and the
//! eligibility rules exist in exactly one place.
//!
//! # Lazy expiry
//!
//! A seat stored as `HELD` whose `held_until` is absent or not in the future is
//! *logically available*. [`EventSeat::normalize`] rewrites such a seat to
//! `AVAILABLE` and is applied at the top of every hold and settle, before any
//! eligibility check.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::types::{EventId, EventSeatId, Money, SeatId};

/// Authoritative status of an event seat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeatStatus {
    /// Free to hold or sell
    Available,
    /// Soft-reserved until `held_until`
    Held,
    /// Sold; terminal
    Sold,
}

impl SeatStatus {
    /// Convert status to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::Held => "HELD",
            Self::Sold => "SOLD",
        }
    }

    /// Parse status from database string.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Database`] if the string doesn't match a known status.
    pub fn parse(s: &str) -> Result<Self, LedgerError> {
        match s {
            "AVAILABLE" => Ok(Self::Available),
            "HELD" => Ok(Self::Held),
            "SOLD" => Ok(Self::Sold),
            _ => Err(LedgerError::Database(format!("Invalid seat status: {s}"))),
        }
    }
}

/// One sellable (event, seat) pairing.
///
/// Invariant: `held_until` is `Some` only while `status == Held`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSeat {
    /// Event seat identifier
    pub id: EventSeatId,
    /// Owning event
    pub event_id: EventId,
    /// Physical seat
    pub seat_id: SeatId,
    /// Current status
    pub status: SeatStatus,
    /// Price fixed when the event was seeded
    pub price: Money,
    /// Hold deadline
    pub held_until: Option<DateTime<Utc>>,
}

impl EventSeat {
    /// A freshly seeded, available seat.
    #[must_use]
    pub const fn available(id: EventSeatId, event_id: EventId, seat_id: SeatId, price: Money) -> Self {
        Self {
            id,
            event_id,
            seat_id,
            status: SeatStatus::Available,
            price,
            held_until: None,
        }
    }

    /// Whether the seat carries a hold that has not yet elapsed at `now`.
    ///
    /// A hold is active strictly before its deadline.
    #[must_use]
    pub fn has_active_hold(&self, now: DateTime<Utc>) -> bool {
        self.status == SeatStatus::Held && self.held_until.is_some_and(|until| until > now)
    }

    /// Revert an elapsed hold to `AVAILABLE`.
    ///
    /// Returns `true` when the seat was changed. Idempotent.
    pub fn normalize(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == SeatStatus::Held && !self.has_active_hold(now) {
            self.status = SeatStatus::Available;
            self.held_until = None;
            return true;
        }
        false
    }

    /// Hold the seat until `until` if it is available at `now`.
    ///
    /// Active holds are never extended or taken over.
    pub fn try_hold(&mut self, until: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.normalize(now);
        if self.status != SeatStatus::Available {
            return false;
        }
        self.status = SeatStatus::Held;
        self.held_until = Some(until);
        true
    }

    /// Whether [`try_sell`](Self::try_sell) would succeed.
    ///
    /// Available seats, seats under an active hold (by anyone) and seats whose
    /// hold has elapsed are all sellable; only sold seats are not.
    #[must_use]
    pub const fn is_sellable(&self) -> bool {
        !matches!(self.status, SeatStatus::Sold)
    }

    /// Mark the seat sold if eligible at `now`.
    ///
    /// An elapsed hold is reclaimed first, so a seat whose hold ran out is sold
    /// in one step.
    pub fn try_sell(&mut self, now: DateTime<Utc>) -> bool {
        self.normalize(now);
        if !self.is_sellable() {
            return false;
        }
        self.status = SeatStatus::Sold;
        self.held_until = None;
        true
    }
}
