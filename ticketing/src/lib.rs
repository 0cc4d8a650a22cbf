//! # Ticketing
//!
//! Service wiring for the seat inventory: configuration from the environment,
//! `PostgreSQL` bootstrap, and the process lifecycle used by the binaries.
//!
//! ## Binaries
//!
//! - `reclaimer`: runs the expiry sweep and event retirement on a schedule,
//!   or once when `SWEEP_RUN_ONCE=true`
//! - `demo`: seeds an event and walks a hold, settle and sweep round trip

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bootstrap;
pub mod config;
pub mod lifecycle;

pub use bootstrap::{BootstrapError, Inventory, Resources};
pub use config::{Config, ConfigError};
pub use lifecycle::{init_tracing, shutdown_signal};
