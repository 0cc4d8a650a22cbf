//! Resource setup: connect the ledger and wire the inventory components.
//!
//! Every component receives the same ledger handle and clock explicitly;
//! nothing is resolved from global state.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = Config::from_env()?;
//! let resources = Resources::from_config(&config).await?;
//!
//! let held = resources.inventory.holds.hold(event_id, &seats, ttl).await?;
//! resources.inventory.sweeper(&config).run_until(shutdown_signal()).await;
//! ```

use crate::config::Config;
use seat_inventory_core::environment::{Clock, SystemClock};
use seat_inventory_core::{
    Catalog, ExpiryReclaimer, HoldManager, InventoryLedger, LedgerError, LifecycleReaper,
    SettlementEngine,
};
use seat_inventory_postgres::PostgresLedger;
use seat_inventory_runtime::metrics::{MetricsError, MetricsServer};
use seat_inventory_runtime::sweeper::Sweeper;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errors raised while bringing the service up.
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// Database connection or migration failed
    #[error("Ledger setup failed: {0}")]
    Ledger(#[from] LedgerError),
    /// Metrics exporter could not be installed
    #[error("Metrics setup failed: {0}")]
    Metrics(#[from] MetricsError),
}

/// The four inventory components sharing one ledger and clock.
#[derive(Clone)]
pub struct Inventory {
    /// Hold acquisition
    pub holds: HoldManager,
    /// Sale finalization
    pub settlement: SettlementEngine,
    /// Expiry sweep
    pub reclaimer: ExpiryReclaimer,
    /// Event retirement
    pub reaper: LifecycleReaper,
}

impl Inventory {
    /// Wire components over `ledger` using the inventory policy in `config`.
    #[must_use]
    pub fn new(ledger: Arc<dyn InventoryLedger>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        Self {
            holds: HoldManager::new(
                Arc::clone(&ledger),
                Arc::clone(&clock),
                config.inventory.default_hold_ttl(),
            ),
            settlement: SettlementEngine::new(Arc::clone(&ledger), Arc::clone(&clock)),
            reclaimer: ExpiryReclaimer::new(Arc::clone(&ledger), Arc::clone(&clock)),
            reaper: LifecycleReaper::new(ledger, clock, config.inventory.ticket_retention),
        }
    }

    /// Background sweeper for the reclaimer and reaper.
    #[must_use]
    pub fn sweeper(&self, config: &Config) -> Sweeper {
        Sweeper::new(
            self.reclaimer.clone(),
            self.reaper.clone(),
            config.sweeper.schedule(),
            config.retry.policy(),
        )
    }
}

/// Infrastructure for a running service.
#[derive(Clone)]
pub struct Resources {
    /// Postgres ledger, also usable as the [`Catalog`]
    pub ledger: Arc<PostgresLedger>,
    /// Wired components
    pub inventory: Inventory,
}

impl Resources {
    /// Connect to `PostgreSQL`, run migrations and wire the components.
    ///
    /// Starts the Prometheus exporter when `METRICS_ADDR` is configured.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError`] if the database is unreachable, migrations
    /// fail, or the metrics exporter cannot be installed.
    pub async fn from_config(config: &Config) -> Result<Self, BootstrapError> {
        if let Some(addr) = config.observability.metrics_addr {
            let mut server = MetricsServer::new(addr);
            server.start()?;
            info!(addr = %server.addr(), "Metrics endpoint listening");
        }

        info!("Connecting to inventory database...");
        let ledger = Arc::new(
            PostgresLedger::connect(&config.postgres.url, &config.postgres.pool_settings()).await?,
        );
        ledger.migrate().await?;

        let health = ledger.health_check().await?;
        info!(
            server_version = %health.server_version,
            server_time = %health.server_time,
            "Inventory database ready"
        );

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let inventory = Inventory::new(ledger.clone(), clock, config);

        Ok(Self { ledger, inventory })
    }

    /// The ledger's catalog view.
    #[must_use]
    pub fn catalog(&self) -> &dyn Catalog {
        self.ledger.as_ref()
    }
}
