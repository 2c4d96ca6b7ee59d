//! Store behaviour under concurrency, delivery failure and shutdown.

#![allow(clippy::unwrap_used, clippy::panic)]

use chairbook_core::effect::{Change, NotificationKind};
use chairbook_core::scheduler::SchedulerAction;
use chairbook_core::transition::{Actor, BookingEvent};
use chairbook_core::types::{
    Booking, BookingId, BookingKind, BookingStatus, OccupancyStatus, StaffId, StaffMember, Version,
};
use chairbook_core::Rejection;
use chairbook_runtime::feed::BroadcastFeed;
use chairbook_runtime::{HealthStatus, StoreError};
use chairbook_testing::fixtures::{self, client, friday_at, friday_morning, ShopFixture};
use chairbook_testing::{FailingNotifier, FixedClock, RecordingFeed, RecordingNotifier};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(friday_morning()))
}

fn open_request(seed: &ShopFixture) -> Booking {
    Booking {
        id: BookingId::new(),
        shop_id: seed.shop.id,
        staff_id: None,
        client: client("Grace Hopper"),
        service: seed.shop.service("Skin Fade").unwrap().snapshot(),
        kind: BookingKind::Appointment,
        scheduled_at: friday_at(15, 0),
        proposed_time: None,
        status: BookingStatus::Pending,
        created_at: friday_morning(),
        updated_at: friday_morning(),
        version: Version::new(1),
    }
}

async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_have_exactly_one_winner() {
    chairbook_testing::init_test_tracing();
    let seed = ShopFixture::new();
    let request = open_request(&seed);
    let mut state = seed.state();
    state.bookings.insert(request.id, request.clone());

    let crew: Vec<StaffId> = (0..8)
        .map(|i| {
            let member = StaffMember::new(StaffId::new(), seed.shop.id, format!("Barber {i}")).on_duty();
            let id = member.id;
            state.staff.insert(id, member);
            id
        })
        .collect();

    let notifier = Arc::new(RecordingNotifier::new());
    let store = fixtures::store(state, clock(), notifier.clone());

    let attempts: Vec<_> = crew
        .iter()
        .map(|staff_id| {
            let store = store.clone();
            let action = SchedulerAction::ApplyTransition {
                booking_id: request.id,
                event: BookingEvent::Claim,
                actor: Actor::Staff(*staff_id),
                expected_version: Some(request.version),
            };
            tokio::spawn(async move { store.send(action).await })
        })
        .collect();

    let results = futures::future::join_all(attempts).await;
    let results: Vec<_> = results.into_iter().map(Result::unwrap).collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    let winner = winners[0].booking().unwrap().staff_id.unwrap();

    for result in &results {
        if let Err(error) = result {
            assert_eq!(
                error.rejection(),
                Some(&Rejection::ClaimLost {
                    booking_id: request.id,
                    claimed_by: Some(winner),
                })
            );
            assert!(error.should_refresh());
        }
    }

    let booking = store.booking(request.id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.staff_id, Some(winner));
    assert_eq!(booking.version, Version::new(2));

    assert!(notifier.wait_for(1, Duration::from_secs(1)).await);
    assert_eq!(notifier.kinds(), vec![NotificationKind::Confirmed]);
}

#[tokio::test]
async fn failed_notification_keeps_the_transition() {
    let seed = ShopFixture::new();
    let notifier = Arc::new(FailingNotifier::always());
    let store = fixtures::store(seed.state(), clock(), notifier.clone());

    let created = store
        .send(SchedulerAction::CreateBooking(
            seed.request_any_staff(friday_at(15, 0)),
        ))
        .await
        .unwrap()
        .into_booking()
        .unwrap();

    assert!(eventually(|| store.dead_letters().len() == 1).await);
    assert!(eventually(|| store.pending_effects() == 0).await);

    let parked = store.dead_letters().drain();
    assert_eq!(parked[0].payload.kind, NotificationKind::VerificationRequested);
    assert_eq!(parked[0].attempts, fixtures::fast_retry().max_attempts());
    assert_eq!(notifier.attempts(), fixtures::fast_retry().max_attempts());

    let stored = store.booking(created.id).await.unwrap();
    assert_eq!(stored.status, BookingStatus::Unverified);
    assert_eq!(stored.version, Version::new(1));
}

#[tokio::test]
async fn rejected_notification_is_parked_without_retry() {
    let seed = ShopFixture::new();
    let notifier = Arc::new(FailingNotifier::rejecting());
    let store = fixtures::store(seed.state(), clock(), notifier.clone());

    store
        .send(SchedulerAction::CreateBooking(
            seed.request_any_staff(friday_at(15, 0)),
        ))
        .await
        .unwrap();

    assert!(eventually(|| store.dead_letters().len() == 1).await);
    assert!(eventually(|| store.pending_effects() == 0).await);

    let parked = store.dead_letters().drain();
    assert_eq!(parked[0].attempts, 1);
    assert!(parked[0].error_message.contains("rejected"));
    assert_eq!(notifier.attempts(), 1);
}

#[tokio::test]
async fn transient_notification_failure_is_retried() {
    let seed = ShopFixture::new();
    let notifier = Arc::new(FailingNotifier::times(1));
    let store = fixtures::store(seed.state(), clock(), notifier.clone());

    store
        .send(SchedulerAction::CreateBooking(
            seed.request_any_staff(friday_at(15, 0)),
        ))
        .await
        .unwrap();

    assert!(eventually(|| notifier.delivered().len() == 1).await);
    assert_eq!(notifier.attempts(), 2);
    assert!(store.dead_letters().is_empty());
    assert!(store.health().status.is_healthy());
}

#[tokio::test]
async fn feed_carries_every_version_in_commit_order() {
    let seed = ShopFixture::new();
    let feed = Arc::new(BroadcastFeed::new(32));
    let store = fixtures::store_with_feed(
        seed.state(),
        clock(),
        Arc::new(RecordingNotifier::new()),
        feed,
    );
    let mut changes = store.subscribe(seed.shop.id);

    let booking = store
        .send(SchedulerAction::CreateBooking(
            seed.request_any_staff(friday_at(15, 0)),
        ))
        .await
        .unwrap()
        .into_booking()
        .unwrap();
    store
        .send(SchedulerAction::ApplyTransition {
            booking_id: booking.id,
            event: BookingEvent::VerifyEmail,
            actor: Actor::Client,
            expected_version: Some(Version::new(1)),
        })
        .await
        .unwrap();
    store
        .send(SchedulerAction::ApplyTransition {
            booking_id: booking.id,
            event: BookingEvent::Claim,
            actor: Actor::Staff(seed.alice.id),
            expected_version: None,
        })
        .await
        .unwrap();

    let mut seen = Vec::new();
    for _ in 0..3 {
        match changes.next().await.unwrap().unwrap().change {
            Change::Booking(snapshot) => seen.push((snapshot.version, snapshot.status)),
            other => panic!("unexpected change {other:?}"),
        }
    }
    assert_eq!(
        seen,
        vec![
            (Version::new(1), BookingStatus::Unverified),
            (Version::new(2), BookingStatus::Pending),
            (Version::new(3), BookingStatus::Confirmed),
        ]
    );
}

#[tokio::test]
async fn rejected_commands_publish_nothing() {
    let seed = ShopFixture::new();
    let feed = Arc::new(RecordingFeed::new());
    let store = fixtures::store_with_feed(
        seed.state(),
        clock(),
        Arc::new(RecordingNotifier::new()),
        feed.clone(),
    );

    let result = store
        .send(SchedulerAction::CreateBooking(
            seed.request_any_staff(friday_at(9, 0)),
        ))
        .await;

    assert_eq!(result, Err(StoreError::Rejected(Rejection::SlotUnavailable)));
    assert!(feed.events().is_empty());
    assert!(store.shop_bookings(seed.shop.id).await.is_empty());
}

#[tokio::test]
async fn walk_in_occupies_the_chair() {
    let seed = ShopFixture::new();
    let feed = Arc::new(RecordingFeed::new());
    let store = fixtures::store_with_feed(
        seed.state(),
        clock(),
        Arc::new(RecordingNotifier::new()),
        feed.clone(),
    );

    let walk_in = store
        .send(SchedulerAction::StartWalkIn {
            shop_id: seed.shop.id,
            staff_id: seed.bob.id,
            service: "Beard Trim".to_string(),
            client: None,
        })
        .await
        .unwrap()
        .into_booking()
        .unwrap();

    assert_eq!(walk_in.status, BookingStatus::Active);
    assert_eq!(walk_in.walk_in_ends_at(), Some(friday_at(10, 30)));
    assert_eq!(
        store.shop(seed.shop.id).await.unwrap().occupancy,
        OccupancyStatus::WithClient
    );

    let published: Vec<_> = feed
        .events_for(seed.shop.id)
        .into_iter()
        .map(|e| matches!(e.change, Change::Shop(_)))
        .collect();
    assert_eq!(published, vec![false, true]);
    assert_eq!(store.staff_schedule(seed.bob.id).await.len(), 1);
}

#[tokio::test]
async fn shutdown_stops_new_commands() {
    let seed = ShopFixture::new();
    let store = fixtures::store(seed.state(), clock(), Arc::new(RecordingNotifier::new()));

    store.shutdown(Duration::from_secs(1)).await.unwrap();
    assert!(store.is_shutting_down());

    let result = store
        .send(SchedulerAction::SetShopOpen {
            shop_id: seed.shop.id,
            is_open: false,
        })
        .await;
    assert_eq!(result, Err(StoreError::ShutdownInProgress));
}

#[tokio::test]
async fn dead_letter_backlog_degrades_health() {
    let seed = ShopFixture::new();
    let store = fixtures::store(seed.state(), clock(), Arc::new(FailingNotifier::always()));

    // Queue capacity is 16; twelve failures puts it over half
    for slot in 0..12 {
        let at = friday_at(11, 0) + chrono::Duration::minutes(30 * slot);
        store
            .send(SchedulerAction::CreateBooking(seed.request_any_staff(at)))
            .await
            .unwrap();
    }

    assert!(eventually(|| store.pending_effects() == 0).await);
    let health = store.health();
    assert_eq!(health.status, HealthStatus::Degraded, "{health:?}");
}

#[tokio::test]
async fn slots_follow_the_clock() {
    let seed = ShopFixture::new();
    let store = fixtures::store(seed.state(), clock(), Arc::new(RecordingNotifier::new()));

    let slots = store.slots(seed.shop.id).await.unwrap();
    assert_eq!(slots.first(), Some(&friday_at(10, 0)));
    assert!(slots.contains(&friday_at(15, 0)));

    store
        .send(SchedulerAction::SetShopOpen {
            shop_id: seed.shop.id,
            is_open: false,
        })
        .await
        .unwrap();
    assert!(store.slots(seed.shop.id).await.unwrap().is_empty());
}
