//! Periodic background sweeps.
//!
//! The [`Sweeper`] drives an [`ExpiryReclaimer`] and a [`LifecycleReaper`]
//! on independent intervals until a shutdown future resolves. Each pass is
//! wrapped in [`retry_transient`]; a pass that still fails is logged and the
//! loop waits for the next tick.

use seat_inventory_core::{ExpiryReclaimer, LifecycleReaper, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};

use crate::retry::{RetryPolicy, retry_transient};

/// How often each sweep runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSchedule {
    /// Interval between expiry sweeps
    pub reclaim_interval: Duration,
    /// Interval between event retirement passes
    pub reap_interval: Duration,
}

impl Default for SweepSchedule {
    fn default() -> Self {
        Self {
            reclaim_interval: Duration::from_secs(60),
            reap_interval: Duration::from_secs(86_400),
        }
    }
}

/// Outcome of a single pass of both sweeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Holds released by the expiry sweep
    pub reclaimed: u64,
    /// Events retired by the reaper
    pub retired: usize,
}

/// Background worker for [`ExpiryReclaimer`] and [`LifecycleReaper`].
#[derive(Clone)]
pub struct Sweeper {
    reclaimer: ExpiryReclaimer,
    reaper: LifecycleReaper,
    schedule: SweepSchedule,
    retry: RetryPolicy,
}

impl Sweeper {
    /// Create a sweeper.
    #[must_use]
    pub const fn new(
        reclaimer: ExpiryReclaimer,
        reaper: LifecycleReaper,
        schedule: SweepSchedule,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            reclaimer,
            reaper,
            schedule,
            retry,
        }
    }

    /// The configured schedule.
    #[must_use]
    pub const fn schedule(&self) -> SweepSchedule {
        self.schedule
    }

    /// One expiry sweep, retried on transient failures.
    ///
    /// # Errors
    ///
    /// The last error once retries are exhausted, or any non-transient error.
    pub async fn reclaim(&self) -> Result<u64> {
        retry_transient(&self.retry, || self.reclaimer.sweep()).await
    }

    /// One retirement pass, retried on transient failures.
    ///
    /// # Errors
    ///
    /// The last error once retries are exhausted, or any non-transient error.
    pub async fn reap(&self) -> Result<usize> {
        let retired = retry_transient(&self.retry, || self.reaper.sweep()).await?;
        Ok(retired.len())
    }

    /// Run both sweeps once: reclaim first, then retire.
    ///
    /// # Errors
    ///
    /// The first sweep that fails after retries.
    pub async fn run_once(&self) -> Result<SweepReport> {
        let reclaimed = self.reclaim().await?;
        let retired = self.reap().await?;
        tracing::info!(reclaimed, retired, "Sweep pass complete");
        Ok(SweepReport { reclaimed, retired })
    }

    /// Run both sweeps on their intervals until `shutdown` resolves.
    ///
    /// Both sweeps fire immediately on start. Failures never stop the loop.
    pub async fn run_until<S>(&self, shutdown: S)
    where
        S: Future<Output = ()> + Send,
    {
        let mut reclaim_tick = interval(self.schedule.reclaim_interval);
        reclaim_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut reap_tick = interval(self.schedule.reap_interval);
        reap_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            reclaim_interval_secs = self.schedule.reclaim_interval.as_secs(),
            reap_interval_secs = self.schedule.reap_interval.as_secs(),
            retention = self.reaper.retention().as_str(),
            "Sweeper started"
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("Sweeper stopping");
                    break;
                }
                _ = reclaim_tick.tick() => {
                    if let Err(e) = self.reclaim().await {
                        tracing::error!(error = %e, "Expiry sweep failed");
                    }
                }
                _ = reap_tick.tick() => {
                    if let Err(e) = self.reap().await {
                        tracing::error!(error = %e, "Event retirement failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use seat_inventory_core::environment::Clock;
    use seat_inventory_core::types::{Money, TicketRetention};
    use seat_inventory_core::{Catalog, HoldManager, InventoryLedger, SeatStatus};
    use seat_inventory_testing::helpers::seeded_event;
    use seat_inventory_testing::{InMemoryLedger, ManualClock, test_clock};
    use std::sync::Arc;
    use tokio::sync::oneshot;

    struct Fixture {
        ledger: InMemoryLedger,
        clock: Arc<ManualClock>,
        holds: HoldManager,
        sweeper: Sweeper,
    }

    fn fixture(schedule: SweepSchedule) -> Fixture {
        let ledger = InMemoryLedger::new();
        let clock = Arc::new(ManualClock::new(test_clock().now()));
        let shared: Arc<dyn InventoryLedger> = Arc::new(ledger.clone());
        let time: Arc<dyn Clock> = clock.clone();

        let holds = HoldManager::new(shared.clone(), time.clone(), ChronoDuration::minutes(15));
        let sweeper = Sweeper::new(
            ExpiryReclaimer::new(shared.clone(), time.clone()),
            LifecycleReaper::new(shared, time, TicketRetention::Cascade),
            schedule,
            RetryPolicy::builder()
                .max_retries(1)
                .initial_delay(Duration::from_millis(1))
                .build(),
        );

        Fixture {
            ledger,
            clock,
            holds,
            sweeper,
        }
    }

    #[tokio::test]
    async fn run_once_reclaims_and_retires() {
        let f = fixture(SweepSchedule::default());
        let now = f.clock.now();

        let upcoming = seeded_event(
            &f.ledger,
            "Gala",
            now + ChronoDuration::hours(2),
            &["A"],
            3,
            Money::from_minor(5000),
        )
        .await
        .unwrap();
        seeded_event(
            &f.ledger,
            "Matinee",
            now - ChronoDuration::hours(1),
            &["A"],
            2,
            Money::from_minor(2500),
        )
        .await
        .unwrap();

        let held = f
            .holds
            .hold(upcoming.event.id, &upcoming.seat_ids(), ChronoDuration::minutes(5))
            .await
            .unwrap();
        assert_eq!(held.len(), 3);

        f.clock.advance(ChronoDuration::minutes(6));
        let report = f.sweeper.run_once().await.unwrap();

        assert_eq!(report, SweepReport { reclaimed: 3, retired: 1 });
        assert_eq!(f.ledger.event_seat_count(), 3);

        // Nothing left to do.
        assert_eq!(f.sweeper.run_once().await.unwrap(), SweepReport::default());
    }

    #[tokio::test]
    async fn run_until_stops_on_shutdown() {
        let f = fixture(SweepSchedule {
            reclaim_interval: Duration::from_millis(10),
            reap_interval: Duration::from_millis(10),
        });
        let now = f.clock.now();
        let seeded = seeded_event(
            &f.ledger,
            "Late Show",
            now + ChronoDuration::hours(3),
            &["B"],
            2,
            Money::from_minor(4000),
        )
        .await
        .unwrap();
        f.holds
            .hold(seeded.event.id, &seeded.seat_ids(), ChronoDuration::minutes(1))
            .await
            .unwrap();
        f.clock.advance(ChronoDuration::minutes(2));

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let sweeper = f.sweeper.clone();
        let worker = tokio::spawn(async move {
            sweeper
                .run_until(async {
                    let _ = stop_rx.await;
                })
                .await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .expect("sweeper did not stop")
            .unwrap();

        let available = f
            .ledger
            .list_event_seats(seeded.event.id, SeatStatus::Available, None)
            .await
            .unwrap();
        assert_eq!(available.len(), 2);
    }
}
