//! `PostgreSQL` inventory ledger for seat inventory.
//!
//! This crate provides [`PostgresLedger`], which implements both
//! [`InventoryLedger`](seat_inventory_core::InventoryLedger) and
//! [`Catalog`](seat_inventory_core::Catalog) from `seat-inventory-core` on top
//! of a `sqlx` connection pool. It supports:
//!
//! - Skip-locked hold acquisition (`FOR UPDATE SKIP LOCKED`)
//! - Blocking, deadlock-free settlement locks (`FOR UPDATE`, ascending ids)
//! - Bulk expiry sweeps and event retirement with optional ticket archiving
//! - Embedded migrations
//!
//! Failures are mapped to [`LedgerError`](seat_inventory_core::LedgerError);
//! serialization failures, deadlocks, lock timeouts and pool timeouts surface
//! as `Transient` so callers know to retry.
//!
//! # Example
//!
//! ```ignore
//! use seat_inventory_postgres::{PoolSettings, PostgresLedger};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let ledger =
//!         PostgresLedger::connect("postgres://localhost/inventory", &PoolSettings::default()).await?;
//!     ledger.migrate().await?;
//!     let health = ledger.health_check().await?;
//!     println!("{}", health.server_version);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod error;
mod ledger;
mod locking;
mod rows;

pub use ledger::{HealthStatus, PoolSettings, PostgresLedger};
