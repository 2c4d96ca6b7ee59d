//! Bootstrap, seed data and lifecycle of the service shell.

#![allow(clippy::unwrap_used)]

use chairbook::seed::SeedError;
use chairbook::{Application, BootstrapError, Config, Seed};
use chairbook_core::effect::NotificationKind;
use chairbook_core::scheduler::SchedulerAction;
use chairbook_core::types::{BookingStatus, ShopId};
use chairbook_core::Rejection;
use chairbook_runtime::StoreError;
use chairbook_testing::fixtures::{friday_at, friday_morning, ShopFixture};
use chairbook_testing::{FailingNotifier, ManualClock, RecordingNotifier};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn config(pairs: &[(&str, &str)]) -> Config {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

fn fast_config() -> Config {
    config(&[
        ("SWEEP_INTERVAL_SECS", "1"),
        ("SHUTDOWN_TIMEOUT", "2"),
        ("NOTIFY_INITIAL_DELAY_MS", "1"),
    ])
}

fn seed_for(fixture: &ShopFixture) -> Seed {
    Seed {
        shops: vec![fixture.shop.clone()],
        staff: vec![fixture.alice.clone(), fixture.bob.clone()],
    }
}

#[tokio::test]
async fn seed_data_is_registered_on_start() {
    let fixture = ShopFixture::new();
    let app = Application::start(
        &fast_config(),
        Arc::new(ManualClock::new(friday_morning())),
        Arc::new(RecordingNotifier::new()),
        seed_for(&fixture),
    )
    .await
    .unwrap();

    let store = app.store().clone();
    assert_eq!(store.shop(fixture.shop.id).await.unwrap().name, "Fades & Co");
    assert_eq!(store.state(|s| s.staff.len()).await, 2);
    assert_eq!(
        store.slots(fixture.shop.id).await.unwrap().first(),
        Some(&friday_at(10, 0))
    );

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn staff_for_an_unknown_shop_aborts_startup() {
    let fixture = ShopFixture::new();
    let seed = Seed {
        shops: Vec::new(),
        staff: vec![fixture.alice.clone()],
    };

    let result = Application::start(
        &fast_config(),
        Arc::new(ManualClock::new(friday_morning())),
        Arc::new(RecordingNotifier::new()),
        seed,
    )
    .await;

    let Err(BootstrapError::Seed(SeedError::Rejected(StoreError::Rejected(rejection)))) = result
    else {
        unreachable!("startup should have been refused");
    };
    assert_eq!(rejection, Rejection::ShopNotFound(fixture.shop.id));
}

#[tokio::test]
async fn background_sweeper_expires_unanswered_requests() {
    let fixture = ShopFixture::new();
    let clock = ManualClock::new(friday_morning());
    let notifier = Arc::new(RecordingNotifier::new());
    let app = Application::start(
        &fast_config(),
        Arc::new(clock.clone()),
        notifier.clone(),
        seed_for(&fixture),
    )
    .await
    .unwrap();
    let store = app.store().clone();

    let booking = store
        .send(SchedulerAction::CreateBooking(
            fixture.request_any_staff(friday_at(15, 0)),
        ))
        .await
        .unwrap()
        .into_booking()
        .unwrap();

    clock.advance(chrono::Duration::minutes(11));

    let mut status = booking.status;
    for _ in 0..300 {
        status = store.booking(booking.id).await.unwrap().status;
        if status == BookingStatus::Cancelled {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, BookingStatus::Cancelled);

    assert!(notifier.wait_for(2, Duration::from_secs(1)).await);
    assert_eq!(
        notifier.kinds(),
        vec![
            NotificationKind::VerificationRequested,
            NotificationKind::Cancelled
        ]
    );

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_refuses_further_commands() {
    let fixture = ShopFixture::new();
    let app = Application::start(
        &fast_config(),
        Arc::new(ManualClock::new(friday_morning())),
        Arc::new(RecordingNotifier::new()),
        seed_for(&fixture),
    )
    .await
    .unwrap();
    let store = app.store().clone();

    tokio::time::timeout(Duration::from_secs(5), app.shutdown())
        .await
        .unwrap()
        .unwrap();

    assert!(store.is_shutting_down());
    let result = store
        .send(SchedulerAction::SetShopOpen {
            shop_id: fixture.shop.id,
            is_open: false,
        })
        .await;
    assert_eq!(result, Err(StoreError::ShutdownInProgress));
}

#[tokio::test]
async fn shutdown_reports_and_clears_dead_letters() {
    let fixture = ShopFixture::new();
    let app = Application::start(
        &fast_config(),
        Arc::new(ManualClock::new(friday_morning())),
        Arc::new(FailingNotifier::rejecting()),
        seed_for(&fixture),
    )
    .await
    .unwrap();
    let store = app.store().clone();

    store
        .send(SchedulerAction::CreateBooking(
            fixture.request_any_staff(friday_at(15, 0)),
        ))
        .await
        .unwrap();
    for _ in 0..200 {
        if store.dead_letters().len() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(store.dead_letters().len(), 1);

    app.shutdown().await.unwrap();
    assert!(store.dead_letters().is_empty());
}

#[tokio::test]
async fn seed_file_is_read_as_json() {
    let fixture = ShopFixture::new();
    let seed = seed_for(&fixture);
    let path = std::env::temp_dir().join(format!("chairbook-seed-{}.json", ShopId::new()));
    tokio::fs::write(&path, serde_json::to_vec(&seed).unwrap())
        .await
        .unwrap();

    let loaded = Seed::load(&path).await;
    tokio::fs::remove_file(&path).await.unwrap();
    assert_eq!(loaded.unwrap(), seed);
}

#[tokio::test]
async fn malformed_seed_file_is_reported() {
    let path = std::env::temp_dir().join(format!("chairbook-seed-{}.json", ShopId::new()));
    tokio::fs::write(&path, b"{ \"shops\": 42 }").await.unwrap();

    let loaded = Seed::load(&path).await;
    tokio::fs::remove_file(&path).await.unwrap();
    assert!(matches!(loaded, Err(SeedError::Parse(_))));

    let missing = std::env::temp_dir().join("chairbook-seed-does-not-exist.json");
    assert!(matches!(Seed::load(&missing).await, Err(SeedError::Read { .. })));
}
