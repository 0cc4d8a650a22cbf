//! # Seat Inventory Runtime
//!
//! Operational plumbing around the inventory components in
//! `seat-inventory-core`:
//!
//! - [`retry`]: exponential backoff for operations failing with
//!   [`LedgerError::Transient`](seat_inventory_core::LedgerError::Transient)
//! - [`sweeper`]: the background worker that runs the expiry sweep and event
//!   retirement on fixed intervals until shutdown
//! - [`metrics`]: Prometheus exporter and metric descriptions
//!
//! # Example
//!
//! ```ignore
//! use seat_inventory_runtime::retry::RetryPolicy;
//! use seat_inventory_runtime::sweeper::{SweepSchedule, Sweeper};
//!
//! let sweeper = Sweeper::new(reclaimer, reaper, SweepSchedule::default(), RetryPolicy::default());
//! sweeper.run_until(shutdown_signal()).await;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod metrics;
pub mod retry;
pub mod sweeper;

pub use retry::{RetryPolicy, retry_transient};
pub use sweeper::{SweepReport, SweepSchedule, Sweeper};
