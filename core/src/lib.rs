//! # Seat Inventory Core
//!
//! Concurrency-control core for contended seat inventory. Every sellable
//! [`EventSeat`](seat::EventSeat) moves through a strict lifecycle:
//!
//! ```text
//! AVAILABLE --hold(ttl)--> HELD
//! HELD --held_until elapses (lazy touch OR sweep)--> AVAILABLE
//! HELD --settle (not expired)--> SOLD
//! AVAILABLE --settle--> SOLD
//! SOLD --(terminal)--
//! * --event retirement--> (deleted)
//! ```
//!
//! This crate provides:
//!
//! - The seat state machine ([`seat`]), defined once and shared by every ledger
//! - Domain types ([`types`]) and the error taxonomy ([`error`])
//! - Storage traits ([`ledger`]): [`InventoryLedger`](ledger::InventoryLedger)
//!   for the transactional operations and [`Catalog`](ledger::Catalog) for the
//!   venue/event/customer records the core depends on
//! - The four components, each constructed with an explicit ledger handle:
//!   [`HoldManager`], [`SettlementEngine`], [`ExpiryReclaimer`] and
//!   [`LifecycleReaper`]
//!
//! # Example
//!
//! ```ignore
//! use seat_inventory_core::{HoldManager, SettlementEngine};
//! use chrono::Duration;
//!
//! let holds = HoldManager::new(ledger.clone(), clock.clone(), Duration::minutes(15));
//! let settlement = SettlementEngine::new(ledger, clock);
//!
//! let held = holds.hold(event_id, &seat_ids, Duration::minutes(10)).await?;
//! if held.len() < seat_ids.len() {
//!     // Partial hold is the normal contract under contention
//! }
//! let sold = settlement.finalize_held(event_id, &held, customer_id).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod hold;
pub mod ledger;
pub mod reaper;
pub mod reclaimer;
pub mod seat;
pub mod settlement;
pub mod types;

pub use error::{LedgerError, Result};
pub use hold::HoldManager;
pub use ledger::{Catalog, InventoryLedger};
pub use reaper::LifecycleReaper;
pub use reclaimer::ExpiryReclaimer;
pub use seat::{EventSeat, SeatStatus};
pub use settlement::SettlementEngine;

/// Environment module - injectable dependencies
///
/// Components never read the wall clock directly; they receive a [`Clock`]
/// at construction time so tests can pin or advance time.
///
/// [`Clock`]: environment::Clock
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use seat_inventory_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let earlier = clock.now();
    /// assert!(clock.now() >= earlier);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
