//! Background sweeper for seat inventory.
//!
//! Releases abandoned holds every `RECLAIM_INTERVAL_SECS` and retires past
//! events every `REAP_INTERVAL_SECS` until Ctrl+C or SIGTERM.
//!
//! # Usage
//!
//! ```bash
//! # Long-running worker
//! cargo run --bin reclaimer
//!
//! # Single pass, e.g. from cron
//! SWEEP_RUN_ONCE=true cargo run --bin reclaimer
//! ```

use chrono::Utc;
use seat_inventory_core::Catalog;
use ticketing::{Config, Resources, init_tracing, shutdown_signal};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    init_tracing(config.observability.log_filter.as_deref());

    info!(
        retention = config.inventory.ticket_retention.as_str(),
        run_once = config.sweeper.run_once,
        "Starting inventory sweeper"
    );

    let resources = Resources::from_config(&config).await?;
    let sweeper = resources.inventory.sweeper(&config);

    if config.sweeper.run_once {
        let schedule = resources.catalog().events_by_schedule(Utc::now()).await?;

        println!("Upcoming events:");
        for event in &schedule.upcoming {
            println!("  [{}] {} at {}", event.id, event.name, event.starts_at);
        }
        println!("Past events:");
        for event in &schedule.past {
            println!("  [{}] {} at {}", event.id, event.name, event.starts_at);
        }

        let report = sweeper.run_once().await?;
        println!(
            "Released {} expired holds, retired {} events",
            report.reclaimed, report.retired
        );
        return Ok(());
    }

    sweeper.run_until(shutdown_signal()).await;
    info!("Sweeper stopped");
    Ok(())
}
