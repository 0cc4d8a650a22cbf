//! # Seat Inventory Testing
//!
//! Testing utilities for the seat inventory workspace.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - [`InMemoryLedger`]: an in-process ledger implementing both
//!   [`InventoryLedger`](seat_inventory_core::InventoryLedger) and
//!   [`Catalog`](seat_inventory_core::Catalog) with real per-row locking
//! - Fixture helpers for seeded events
//!
//! ## Example
//!
//! ```ignore
//! use seat_inventory_testing::{InMemoryLedger, ManualClock, helpers::seeded_event};
//!
//! #[tokio::test]
//! async fn hold_then_settle() {
//!     let ledger = Arc::new(InMemoryLedger::new());
//!     let clock = Arc::new(ManualClock::new(test_clock().now()));
//!     let fixture = seeded_event(ledger.as_ref(), "Opening Night", starts_at, &["A"], 3, price).await?;
//!     // ...
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use seat_inventory_core::environment::Clock;

pub mod ledger;

pub use ledger::InMemoryLedger;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Duration, Utc};
    use std::sync::{Arc, PoisonError, RwLock};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use seat_inventory_testing::mocks::FixedClock;
    /// use seat_inventory_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time, so a test can keep one handle and give
    /// another to the components under test.
    ///
    /// # Example
    ///
    /// ```
    /// use seat_inventory_testing::mocks::ManualClock;
    /// use seat_inventory_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let start = Utc::now();
    /// let clock = ManualClock::new(start);
    /// clock.advance(Duration::minutes(10));
    /// assert_eq!(clock.now(), start + Duration::minutes(10));
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock starting at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Move the clock forward (or backward, for a negative duration)
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.write().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to an absolute time
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.write().unwrap_or_else(PoisonError::into_inner) = to;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::<Utc>::UNIX_EPOCH + Duration::days(20_089))
    }
}

/// Test helpers and utilities
pub mod helpers {
    use chrono::{DateTime, Utc};
    use seat_inventory_core::seat::SeatStatus;
    use seat_inventory_core::types::{Event, EventSeatSnapshot, Money, PriceList, SeatId, Venue};
    use seat_inventory_core::{Catalog, Result};

    /// A venue, an event and its seeded seats.
    #[derive(Debug, Clone)]
    pub struct SeededEvent {
        /// The venue
        pub venue: Venue,
        /// The event
        pub event: Event,
        /// Seeded event seats in (row, number) order
        pub seats: Vec<EventSeatSnapshot>,
    }

    impl SeededEvent {
        /// Physical seat ids of the seeded seats, in order
        #[must_use]
        pub fn seat_ids(&self) -> Vec<SeatId> {
            self.seats.iter().map(|s| s.seat_id).collect()
        }

        /// Seeded seat with the given label, e.g. `A2`
        #[must_use]
        pub fn seat(&self, label: &str) -> Option<&EventSeatSnapshot> {
            self.seats.iter().find(|s| s.seat_label == label)
        }
    }

    /// Create a venue with `rows` x `per_row` seats, an event starting at
    /// `starts_at`, and seed every seat at `price`.
    ///
    /// The venue is named after the event so fixtures never share seats.
    ///
    /// # Errors
    ///
    /// Returns error if any catalog operation fails.
    pub async fn seeded_event<C: Catalog + ?Sized>(
        catalog: &C,
        name: &str,
        starts_at: DateTime<Utc>,
        rows: &[&str],
        per_row: i32,
        price: Money,
    ) -> Result<SeededEvent> {
        let venue = catalog
            .ensure_venue(format!("{name} Hall"), None)
            .await?;
        catalog
            .ensure_seat_grid(
                venue.id,
                rows.iter().map(ToString::to_string).collect(),
                (1..=per_row).collect(),
            )
            .await?;
        let event = catalog
            .resolve_or_create_event(venue.id, name.to_string(), starts_at, None)
            .await?;
        catalog
            .seed_event_seats(event.id, PriceList::flat(price), None)
            .await?;
        let seats = catalog
            .list_event_seats(event.id, SeatStatus::Available, None)
            .await?;

        Ok(SeededEvent { venue, event, seats })
    }

    /// Install a test-friendly tracing subscriber once per process.
    ///
    /// Honors `RUST_LOG`; repeated calls are ignored.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with_test_writer()
            .try_init();
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, test_clock};
