//! Prometheus metrics for seat inventory services.
//!
//! Components and ledgers record through the `metrics` facade; this module
//! installs the Prometheus exporter and describes every inventory metric:
//! - Hold requests and grants
//! - Settlement requests and sales
//! - Lazy and swept reclaims, retired events
//! - Ledger transaction latency
//! - Retry attempts
//!
//! # Example
//!
//! ```rust,no_run
//! use seat_inventory_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Start metrics server on port 9090
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Latency buckets for `*_duration_seconds` histograms.
const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Prometheus metrics server.
///
/// Exposes metrics on an HTTP endpoint for Prometheus scraping.
#[derive(Debug)]
pub struct MetricsServer {
    addr: SocketAddr,
    started: bool,
}

impl MetricsServer {
    /// Create a new metrics server bound to `addr` once started.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            started: false,
        }
    }

    /// Address the exporter listens on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Whether this server installed the global recorder.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }

    /// Install the Prometheus recorder and start its HTTP listener.
    ///
    /// Must be called from within a Tokio runtime. A recorder installed
    /// earlier (e.g. by another test) is tolerated with a warning.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                DURATION_BUCKETS,
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install() {
            Ok(()) => {
                self.started = true;
                tracing::info!(
                    addr = %self.addr,
                    "Metrics server started - available at http://{}/metrics",
                    self.addr
                );
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }
}

/// Describe every inventory metric to the installed recorder.
pub fn register_metrics() {
    describe_counter!(
        "inventory_hold_requested_total",
        "Seats requested across all hold calls"
    );
    describe_counter!(
        "inventory_hold_granted_total",
        "Seats actually held by hold calls"
    );
    describe_counter!(
        "inventory_settle_requested_total",
        "Event seats requested across all settle calls"
    );
    describe_counter!(
        "inventory_settle_sold_total",
        "Event seats sold and ticketed"
    );
    describe_counter!(
        "inventory_lazy_reclaimed_total",
        "Elapsed holds released while touched by hold or settle"
    );
    describe_counter!(
        "inventory_sweep_reclaimed_total",
        "Elapsed holds released by the expiry sweep"
    );
    describe_counter!(
        "inventory_events_retired_total",
        "Past events deleted by the lifecycle reaper"
    );
    describe_histogram!(
        "inventory_ledger_tx_duration_seconds",
        "Ledger transaction duration in seconds, labelled by op"
    );

    describe_counter!("retry_attempts_total", "Total number of retry attempts");
    describe_counter!(
        "retry_successes_total",
        "Operations that succeeded after at least one retry"
    );
    describe_counter!(
        "retry_exhausted_total",
        "Operations that failed after exhausting all retries"
    );
}
