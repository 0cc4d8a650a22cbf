//! End-to-end component tests against the in-memory ledger.
//!
//! Each test wires the components the way an application does: one shared
//! ledger, one shared clock, components constructed with both injected.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use chrono::Duration;
use seat_inventory_core::environment::Clock;
use seat_inventory_core::types::{Customer, Money, TicketRetention, latest_deadline};
use seat_inventory_core::{
    Catalog, ExpiryReclaimer, HoldManager, InventoryLedger, LedgerError, LifecycleReaper,
    SeatStatus, SettlementEngine,
};
use seat_inventory_testing::helpers::{SeededEvent, seeded_event};
use seat_inventory_testing::{InMemoryLedger, ManualClock, test_clock};
use std::sync::Arc;

struct Harness {
    ledger: InMemoryLedger,
    clock: ManualClock,
    holds: HoldManager,
    settlement: SettlementEngine,
    reclaimer: ExpiryReclaimer,
}

impl Harness {
    fn new() -> Self {
        let ledger = InMemoryLedger::new();
        let clock = ManualClock::new(test_clock().now());
        let shared: Arc<dyn InventoryLedger> = Arc::new(ledger.clone());
        let time: Arc<dyn Clock> = Arc::new(clock.clone());
        Self {
            holds: HoldManager::new(Arc::clone(&shared), Arc::clone(&time), Duration::minutes(15)),
            settlement: SettlementEngine::new(Arc::clone(&shared), Arc::clone(&time)),
            reclaimer: ExpiryReclaimer::new(shared, time),
            ledger,
            clock,
        }
    }

    fn reaper(&self, retention: TicketRetention) -> LifecycleReaper {
        LifecycleReaper::new(Arc::new(self.ledger.clone()), Arc::new(self.clock.clone()), retention)
    }

    async fn event(&self, name: &str, seats: i32) -> SeededEvent {
        seeded_event(
            &self.ledger,
            name,
            self.clock.now() + Duration::days(7),
            &["A"],
            seats,
            Money::from_minor(2500),
        )
        .await
        .unwrap()
    }

    async fn customer(&self, email: &str) -> Customer {
        self.ledger
            .resolve_or_create_customer("Buyer".into(), email.into(), None)
            .await
            .unwrap()
    }

    async fn status(&self, fixture: &SeededEvent, label: &str) -> SeatStatus {
        let id = fixture.seat(label).unwrap().id;
        self.ledger.event_seat(id).await.unwrap().status
    }
}

#[tokio::test]
async fn hold_skips_sold_and_reclaims_expired_then_settle_sells_both() {
    let h = Harness::new();
    let fixture = h.event("Scenario", 3).await;
    let (s1, s2, s3) = (
        fixture.seat("A1").unwrap().id,
        fixture.seat("A2").unwrap().id,
        fixture.seat("A3").unwrap().id,
    );
    let now = h.clock.now();
    h.ledger
        .force_seat_state(s2, SeatStatus::Held, Some(now - Duration::minutes(1)))
        .unwrap();
    h.ledger.force_seat_state(s3, SeatStatus::Sold, None).unwrap();

    let held = h
        .holds
        .hold(fixture.event.id, &fixture.seat_ids(), Duration::minutes(10))
        .await
        .unwrap();
    assert_eq!(held, [s1, s2]);
    for id in [s1, s2] {
        let snapshot = h.ledger.event_seat(id).await.unwrap();
        assert_eq!(snapshot.status, SeatStatus::Held);
        assert_eq!(snapshot.held_until, Some(now + Duration::minutes(10)));
    }
    assert_eq!(h.status(&fixture, "A3").await, SeatStatus::Sold);

    let buyer = h.customer("x@example.com").await;
    let sold = h
        .settlement
        .settle(fixture.event.id, &[s1, s2, s3], buyer.id)
        .await
        .unwrap();
    let labels: Vec<_> = sold.iter().map(|s| s.seat_label.as_str()).collect();
    assert_eq!(labels, ["A1", "A2"]);
    assert!(sold.iter().all(|s| s.ticket.customer_id == buyer.id));
    assert!(sold.iter().all(|s| s.ticket.price == Money::from_minor(2500)));
    assert!(h.ledger.tickets_for_event_seat(s3).is_empty());
}

#[tokio::test]
async fn partial_hold_with_sold_and_contended_seats() {
    let h = Harness::new();
    let fixture = h.event("Partial", 3).await;
    let sold = fixture.seat("A1").unwrap().id;
    let contended = fixture.seat("A2").unwrap().id;
    h.ledger.force_seat_state(sold, SeatStatus::Sold, None).unwrap();

    let other_tx = h.ledger.lock_seat(contended).await;
    let held = h
        .holds
        .hold(fixture.event.id, &fixture.seat_ids(), Duration::minutes(5))
        .await
        .unwrap();
    drop(other_tx);

    assert_eq!(held, [fixture.seat("A3").unwrap().id]);
    assert_eq!(h.status(&fixture, "A2").await, SeatStatus::Available);
}

#[tokio::test]
async fn hold_is_never_extended_or_taken_over() {
    let h = Harness::new();
    let fixture = h.event("NoSteal", 1).await;

    let first = h
        .holds
        .hold(fixture.event.id, &fixture.seat_ids(), Duration::minutes(5))
        .await
        .unwrap();
    assert_eq!(first.len(), 1);

    h.clock.advance(Duration::minutes(4));
    let second = h
        .holds
        .hold(fixture.event.id, &fixture.seat_ids(), Duration::minutes(30))
        .await
        .unwrap();
    assert!(second.is_empty());

    let snapshot = h.ledger.event_seat(first[0]).await.unwrap();
    assert_eq!(snapshot.held_until, Some(test_clock().now() + Duration::minutes(5)));
}

#[tokio::test]
async fn hold_expires_exactly_at_its_deadline() {
    let h = Harness::new();
    let fixture = h.event("Boundary", 1).await;
    let ids = fixture.seat_ids();
    h.holds
        .hold(fixture.event.id, &ids, Duration::minutes(10))
        .await
        .unwrap();

    h.clock.advance(Duration::minutes(10) - Duration::milliseconds(1));
    assert!(h.holds.hold(fixture.event.id, &ids, Duration::minutes(10)).await.unwrap().is_empty());
    assert_eq!(h.reclaimer.sweep().await.unwrap(), 0);

    h.clock.advance(Duration::milliseconds(1));
    assert_eq!(
        h.holds.hold(fixture.event.id, &ids, Duration::minutes(10)).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn non_positive_ttl_falls_back_to_default() {
    let h = Harness::new();
    let fixture = h.event("Coerce", 2).await;
    let ids = fixture.seat_ids();

    let zero = h.holds.hold(fixture.event.id, &ids[..1], Duration::zero()).await.unwrap();
    let negative = h
        .holds
        .hold(fixture.event.id, &ids[1..], Duration::minutes(-3))
        .await
        .unwrap();

    for id in zero.into_iter().chain(negative) {
        let snapshot = h.ledger.event_seat(id).await.unwrap();
        assert_eq!(snapshot.held_until, Some(h.clock.now() + Duration::minutes(15)));
    }
}

#[tokio::test]
async fn unbounded_ttl_is_capped_at_latest_deadline() {
    let h = Harness::new();
    let fixture = h.event("Forever", 2).await;
    let ids = fixture.seat_ids();

    let held = h.holds.hold(fixture.event.id, &ids, Duration::MAX).await.unwrap();
    assert_eq!(held.len(), 2);
    for id in held {
        let snapshot = h.ledger.event_seat(id).await.unwrap();
        assert_eq!(snapshot.status, SeatStatus::Held);
        assert_eq!(snapshot.held_until, Some(latest_deadline()));
    }

    h.clock.advance(Duration::days(365 * 100));
    assert_eq!(h.reclaimer.sweep().await.unwrap(), 0);
}

#[tokio::test]
async fn sub_microsecond_clock_never_shortens_a_hold() {
    let h = Harness::new();
    let fixture = h.event("Nanos", 1).await;
    let ids = fixture.seat_ids();
    h.clock.advance(Duration::nanoseconds(1_500));

    let held = h.holds.hold(fixture.event.id, &ids, Duration::minutes(10)).await.unwrap();
    let deadline = h.ledger.event_seat(held[0]).await.unwrap().held_until.unwrap();
    assert_eq!(deadline.timestamp_subsec_nanos() % 1_000, 0);
    assert_eq!(deadline, test_clock().now() + Duration::microseconds(1) + Duration::minutes(10));

    h.clock.set(deadline - Duration::nanoseconds(1));
    assert!(h.holds.hold(fixture.event.id, &ids, Duration::minutes(1)).await.unwrap().is_empty());
    assert_eq!(h.reclaimer.sweep().await.unwrap(), 0);

    h.clock.set(deadline);
    assert_eq!(h.reclaimer.sweep().await.unwrap(), 1);
}

#[tokio::test]
async fn empty_requests_are_no_ops() {
    let h = Harness::new();
    let fixture = h.event("Empty", 1).await;
    let buyer = h.customer("empty@example.com").await;

    assert!(h.holds.hold(fixture.event.id, &[], Duration::minutes(5)).await.unwrap().is_empty());
    assert!(h.settlement.settle(fixture.event.id, &[], buyer.id).await.unwrap().is_empty());
    assert_eq!(h.ledger.ticket_count(), 0);
}

#[tokio::test]
async fn settle_reclaims_expired_hold_in_one_step() {
    let h = Harness::new();
    let fixture = h.event("Lazy", 1).await;
    let held = h
        .holds
        .hold(fixture.event.id, &fixture.seat_ids(), Duration::minutes(1))
        .await
        .unwrap();
    h.clock.advance(Duration::minutes(2));

    let buyer = h.customer("late@example.com").await;
    let sold = h.settlement.finalize_held(fixture.event.id, &held, buyer.id).await.unwrap();

    assert_eq!(sold.len(), 1);
    let snapshot = h.ledger.event_seat(held[0]).await.unwrap();
    assert_eq!(snapshot.status, SeatStatus::Sold);
    assert_eq!(snapshot.held_until, None);
    assert_eq!(h.reclaimer.sweep().await.unwrap(), 0);
}

#[tokio::test]
async fn settle_preserves_caller_order_and_ignores_duplicates_and_foreign_ids() {
    let h = Harness::new();
    let fixture = h.event("Order", 3).await;
    let other = h.event("Elsewhere", 1).await;
    let buyer = h.customer("order@example.com").await;
    let ids: Vec<_> = ["A3", "A1", "A3", "A2"]
        .iter()
        .map(|l| fixture.seat(l).unwrap().id)
        .chain([other.seats[0].id])
        .collect();

    let sold = h.settlement.settle(fixture.event.id, &ids, buyer.id).await.unwrap();

    let labels: Vec<_> = sold.iter().map(|s| s.seat_label.as_str()).collect();
    assert_eq!(labels, ["A3", "A1", "A2"]);
    assert_eq!(h.ledger.event_seat(other.seats[0].id).await.unwrap().status, SeatStatus::Available);
}

#[tokio::test]
async fn active_hold_is_honored_for_any_buyer() {
    let h = Harness::new();
    let fixture = h.event("Bearer", 1).await;
    let held = h
        .holds
        .hold(fixture.event.id, &fixture.seat_ids(), Duration::minutes(10))
        .await
        .unwrap();

    let stranger = h.customer("stranger@example.com").await;
    let sold = h.settlement.settle(fixture.event.id, &held, stranger.id).await.unwrap();
    assert_eq!(sold.len(), 1);

    let again = h.customer("again@example.com").await;
    assert!(h.settlement.settle(fixture.event.id, &held, again.id).await.unwrap().is_empty());
    assert_eq!(h.ledger.tickets_for_event_seat(held[0]).len(), 1);
}

#[tokio::test]
async fn sweep_is_idempotent() {
    let h = Harness::new();
    let fixture = h.event("Sweep", 4).await;
    h.holds
        .hold(fixture.event.id, &fixture.seat_ids()[..3], Duration::minutes(5))
        .await
        .unwrap();
    let no_deadline = fixture.seat("A4").unwrap().id;
    h.ledger.force_seat_state(no_deadline, SeatStatus::Held, None).unwrap();

    h.clock.advance(Duration::minutes(5));
    assert_eq!(h.reclaimer.sweep().await.unwrap(), 4);
    assert_eq!(h.reclaimer.sweep().await.unwrap(), 0);

    let available = h
        .ledger
        .list_event_seats(fixture.event.id, SeatStatus::Available, None)
        .await
        .unwrap();
    assert_eq!(available.len(), 4);
    assert!(available.iter().all(|s| s.held_until.is_none()));
}

#[tokio::test]
async fn retiring_cascades_seats_and_tickets() {
    let h = Harness::new();
    let fixture = h.event("Cascade", 5).await;
    let buyer = h.customer("cascade@example.com").await;
    let ids: Vec<_> = fixture.seats.iter().map(|s| s.id).collect();
    h.settlement.settle(fixture.event.id, &ids[..2], buyer.id).await.unwrap();
    h.holds
        .hold(fixture.event.id, &fixture.seat_ids()[2..3], Duration::minutes(5))
        .await
        .unwrap();

    h.clock.advance(Duration::days(8));
    let retired = h.reaper(TicketRetention::Cascade).sweep().await.unwrap();

    assert_eq!(retired.len(), 1);
    assert_eq!(retired[0].seats_removed, 5);
    assert_eq!(retired[0].tickets_removed, 2);
    assert_eq!(retired[0].tickets_archived, 0);
    assert_eq!(h.ledger.ticket_count(), 0);
    assert_eq!(h.ledger.event_seat_count(), 0);
    assert!(h.ledger.archived_tickets().is_empty());
    assert!(h.ledger.event_seat(ids[0]).await.is_err());
}

#[tokio::test]
async fn retiring_with_archive_keeps_sale_history() {
    let h = Harness::new();
    let fixture = h.event("Archive", 5).await;
    let buyer = h.customer("archive@example.com").await;
    let ids: Vec<_> = fixture.seats.iter().map(|s| s.id).collect();
    h.settlement.settle(fixture.event.id, &ids[3..], buyer.id).await.unwrap();

    h.clock.advance(Duration::days(8));
    let retired = h.reaper(TicketRetention::Archive).sweep().await.unwrap();

    assert_eq!(retired[0].tickets_archived, 2);
    let archived = h.ledger.archived_tickets();
    let labels: Vec<_> = archived.iter().map(|t| t.seat_label.as_str()).collect();
    assert_eq!(labels, ["A4", "A5"]);
    assert!(archived.iter().all(|t| t.event_name == "Archive" && t.customer_id == buyer.id));
    assert_eq!(h.ledger.ticket_count(), 0);
}

#[tokio::test]
async fn reaper_leaves_upcoming_events_alone() {
    let h = Harness::new();
    let fixture = h.event("Future", 2).await;

    h.clock.advance(Duration::days(7));
    assert!(h.reaper(TicketRetention::Cascade).sweep().await.unwrap().is_empty());

    h.clock.advance(Duration::seconds(1));
    let retired = h.reaper(TicketRetention::Cascade).sweep().await.unwrap();
    assert_eq!(retired[0].event_id, fixture.event.id);
}

#[tokio::test]
async fn retire_event_removes_an_event_before_it_starts() {
    let h = Harness::new();
    let cancelled = h.event("Cancelled", 3).await;
    let kept = h.event("Kept", 2).await;
    let buyer = h.customer("refund@example.com").await;
    let ids: Vec<_> = cancelled.seats.iter().map(|s| s.id).collect();
    h.settlement.settle(cancelled.event.id, &ids[..1], buyer.id).await.unwrap();

    let reaper = h.reaper(TicketRetention::Archive);
    let retired = reaper.retire_event(cancelled.event.id).await.unwrap();

    assert_eq!(retired.event_id, cancelled.event.id);
    assert_eq!(retired.seats_removed, 3);
    assert_eq!(retired.tickets_removed, 1);
    assert_eq!(retired.tickets_archived, 1);
    assert_eq!(h.ledger.archived_tickets()[0].archived_at, h.clock.now());
    assert_eq!(h.ledger.event_seat_count(), 2);
    assert_eq!(h.status(&kept, "A1").await, SeatStatus::Available);
}

#[tokio::test]
async fn retire_event_reports_unknown_event() {
    let h = Harness::new();
    let fixture = h.event("Once", 1).await;
    let reaper = h.reaper(TicketRetention::Cascade);
    reaper.retire_event(fixture.event.id).await.unwrap();

    let err = reaper.retire_event(fixture.event.id).await.unwrap_err();
    assert_eq!(err, LedgerError::not_found("event", fixture.event.id));
}
