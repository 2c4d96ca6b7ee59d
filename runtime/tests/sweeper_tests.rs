//! Expiry sweeps against a store driven by a manual clock.

#![allow(clippy::unwrap_used)]

use chairbook_core::effect::NotificationKind;
use chairbook_core::scheduler::SchedulerAction;
use chairbook_core::transition::{Actor, BookingEvent, CancelReason};
use chairbook_core::types::{BookingStatus, OccupancyStatus, Version};
use chairbook_runtime::sweeper::{ExpirySweeper, SweepReport};
use chairbook_runtime::Store;
use chairbook_testing::fixtures::{self, friday_at, friday_morning, ShopFixture};
use chairbook_testing::{ManualClock, RecordingNotifier};
use chrono::Duration as Minutes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

struct Harness {
    seed: ShopFixture,
    clock: ManualClock,
    notifier: Arc<RecordingNotifier>,
    store: Store,
}

impl Harness {
    fn new() -> Self {
        let seed = ShopFixture::new();
        let clock = ManualClock::new(friday_morning());
        let notifier = Arc::new(RecordingNotifier::new());
        let store = fixtures::store(seed.state(), Arc::new(clock.clone()), notifier.clone());
        Self {
            seed,
            clock,
            notifier,
            store,
        }
    }

    fn sweeper(&self) -> ExpirySweeper {
        ExpirySweeper::new(self.store.clone(), Duration::from_millis(10))
    }

    async fn request(&self) -> chairbook_core::types::Booking {
        self.store
            .send(SchedulerAction::CreateBooking(
                self.seed.request_any_staff(friday_at(15, 0)),
            ))
            .await
            .unwrap()
            .into_booking()
            .unwrap()
    }
}

#[tokio::test]
async fn unanswered_request_expires_after_ttl() {
    let h = Harness::new();
    let booking = h.request().await;
    let sweeper = h.sweeper();

    h.clock.advance(Minutes::minutes(10));
    assert_eq!(sweeper.sweep_once().await, SweepReport::default());

    h.clock.advance(Minutes::seconds(1));
    let report = sweeper.sweep_once().await;
    assert_eq!(report.expired, 1);

    let expired = h.store.booking(booking.id).await.unwrap();
    assert_eq!(expired.status, BookingStatus::Cancelled);
    assert_eq!(expired.version, Version::new(2));

    assert!(h.notifier.wait_for(2, Duration::from_secs(1)).await);
    assert_eq!(
        h.notifier.kinds(),
        vec![
            NotificationKind::VerificationRequested,
            NotificationKind::Cancelled
        ]
    );
}

#[tokio::test]
async fn sweeping_twice_changes_nothing_more() {
    let h = Harness::new();
    h.request().await;
    h.request().await;
    let sweeper = h.sweeper();

    h.clock.advance(Minutes::minutes(30));
    assert_eq!(sweeper.sweep_once().await.expired, 2);
    let after_first = h.store.state(Clone::clone).await;

    assert_eq!(sweeper.sweep_once().await, SweepReport::default());
    assert_eq!(h.store.state(Clone::clone).await, after_first);
}

#[tokio::test]
async fn confirmed_requests_are_left_alone() {
    let h = Harness::new();
    let booking = h.request().await;
    h.store
        .send(SchedulerAction::ApplyTransition {
            booking_id: booking.id,
            event: BookingEvent::Claim,
            actor: Actor::Staff(h.seed.alice.id),
            expected_version: Some(booking.version),
        })
        .await
        .unwrap();

    h.clock.advance(Minutes::hours(2));
    assert_eq!(h.sweeper().sweep_once().await.applied(), 0);
    assert_eq!(
        h.store.booking(booking.id).await.unwrap().status,
        BookingStatus::Confirmed
    );
}

#[tokio::test]
async fn selection_carries_the_observed_version() {
    let h = Harness::new();
    let booking = h.request().await;
    h.clock.advance(Minutes::minutes(11));

    let due = h.store.due_transitions().await;
    assert_eq!(due.len(), 1);

    // The client verifies between selection and apply
    h.store
        .send(SchedulerAction::ApplyTransition {
            booking_id: booking.id,
            event: BookingEvent::VerifyEmail,
            actor: Actor::Client,
            expected_version: None,
        })
        .await
        .unwrap();

    let stale = h
        .store
        .send(SchedulerAction::ApplyTransition {
            booking_id: due[0].booking_id,
            event: due[0].event,
            actor: Actor::System,
            expected_version: Some(due[0].expected_version),
        })
        .await;
    assert!(stale.unwrap_err().should_refresh());
    assert_eq!(
        h.store.booking(booking.id).await.unwrap().status,
        BookingStatus::Pending
    );
}

#[tokio::test]
async fn finished_walk_in_frees_the_chair() {
    let h = Harness::new();
    let walk_in = h
        .store
        .send(SchedulerAction::StartWalkIn {
            shop_id: h.seed.shop.id,
            staff_id: h.seed.alice.id,
            service: "Skin Fade".to_string(),
            client: None,
        })
        .await
        .unwrap()
        .into_booking()
        .unwrap();

    h.clock.advance(Minutes::minutes(44));
    assert_eq!(h.sweeper().sweep_once().await.completed, 0);

    h.clock.advance(Minutes::minutes(1));
    assert_eq!(h.sweeper().sweep_once().await.completed, 1);

    assert_eq!(
        h.store.booking(walk_in.id).await.unwrap().status,
        BookingStatus::Completed
    );
    assert_eq!(
        h.store.shop(h.seed.shop.id).await.unwrap().occupancy,
        OccupancyStatus::Available
    );
}

#[tokio::test]
async fn cancelled_walk_in_is_not_auto_completed() {
    let h = Harness::new();
    let walk_in = h
        .store
        .send(SchedulerAction::StartWalkIn {
            shop_id: h.seed.shop.id,
            staff_id: h.seed.alice.id,
            service: "Beard Trim".to_string(),
            client: None,
        })
        .await
        .unwrap()
        .into_booking()
        .unwrap();
    h.store
        .send(SchedulerAction::ApplyTransition {
            booking_id: walk_in.id,
            event: BookingEvent::Cancel {
                reason: CancelReason::NoShow,
            },
            actor: Actor::Staff(h.seed.alice.id),
            expected_version: None,
        })
        .await
        .unwrap();

    h.clock.advance(Minutes::hours(1));
    assert_eq!(h.sweeper().sweep_once().await, SweepReport::default());
}

#[tokio::test]
async fn background_sweeper_runs_until_told_to_stop() {
    let h = Harness::new();
    let booking = h.request().await;
    let (stop, stopped) = watch::channel(false);
    let handle = h.sweeper().spawn(stopped);

    h.clock.advance(Minutes::minutes(15));

    let mut expired = false;
    for _ in 0..200 {
        if h.store.booking(booking.id).await.unwrap().status == BookingStatus::Cancelled {
            expired = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(expired);

    stop.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();
}
