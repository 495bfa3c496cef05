use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use roost::api::{BookingApi, CreateBookingInput, Latency};
use roost::catalog::{PropertyCatalog, SearchQuery};
use roost::engine::{DEFAULT_EXTRA_GUEST_FEE, EngineError};
use roost::model::{BookingEvent, BookingPatch, Destination, NIGHT_MS, Stay};
use roost::session::SessionManager;

// ── Test infrastructure ──────────────────────────────────────

fn test_data_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("roost_int_test").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn fixture_catalog() -> Arc<PropertyCatalog> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/properties.json");
    Arc::new(PropertyCatalog::load(&path).unwrap())
}

fn manager(dir: PathBuf) -> SessionManager {
    SessionManager::new(dir, fixture_catalog(), 1000, DEFAULT_EXTRA_GUEST_FEE)
}

fn stay(from_night: i64, to_night: i64) -> Stay {
    Stay::new(from_night * NIGHT_MS, to_night * NIGHT_MS)
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn fixture_catalog_loads_and_searches() {
    let catalog = fixture_catalog();
    assert_eq!(catalog.len(), 8);

    let hits = catalog
        .search(&SearchQuery {
            destination: Some(Destination {
                city: "Malibu".into(),
                state: "California".into(),
                country: "United States".into(),
            }),
            guests: Some(6),
            stay: Some(stay(0, 7)),
        })
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].property.title, "Oceanfront Villa with Infinity Pool");
    assert_eq!(hits[0].stay_total, Some(840.0));
}

#[tokio::test]
async fn bookings_survive_session_reopen() {
    let dir = test_data_dir("reopen");
    let catalog = fixture_catalog();
    let property_a = catalog.all()[0].id;
    let property_b = catalog.all()[1].id;

    let (first_id, second_id);
    {
        let sessions = manager(dir.clone());
        let api = BookingApi::new(sessions.get_or_create("traveler").unwrap(), Latency::None);
        first_id = api
            .create_booking(CreateBookingInput {
                property_id: property_a,
                stay: stay(5, 12),
                guests: 2,
            })
            .await
            .unwrap()
            .id;
        second_id = api
            .create_booking(CreateBookingInput {
                property_id: property_b,
                stay: stay(1, 4),
                guests: 4,
            })
            .await
            .unwrap()
            .id;
    }

    let sessions = manager(dir);
    let engine = sessions.get_or_create("traveler").unwrap();
    let all = engine.list_bookings().await;
    assert_eq!(all.len(), 2);
    // Most-recent-first ordering survives the restart.
    assert_eq!(all[0].id, second_id);
    assert_eq!(all[1].id, first_id);
    // 7 nights at the villa's 120/night
    assert_eq!(all[1].total_price, 840.0);
}

#[tokio::test]
async fn concurrent_overlapping_submissions_admit_exactly_one() {
    let dir = test_data_dir("concurrent");
    let sessions = manager(dir);
    let engine = sessions.get_or_create("traveler").unwrap();
    let property_id = fixture_catalog().all()[0].id;

    let api = Arc::new(BookingApi::new(engine.clone(), Latency::Jittered {
        max: Duration::from_millis(10),
    }));

    // Four in-flight submissions race for overlapping ranges.
    let submissions = (0..4).map(|i| {
        let api = api.clone();
        tokio::spawn(async move {
            api.create_booking(CreateBookingInput {
                property_id,
                stay: stay(5 + i, 12 + i),
                guests: 2,
            })
            .await
        })
    });
    let outcomes: Vec<_> = join_all(submissions)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let ok = outcomes.iter().filter(|r| r.is_ok()).count();
    let conflicts = outcomes
        .iter()
        .filter(|r| matches!(r, Err(EngineError::RangeConflict(_))))
        .count();
    assert_eq!(ok, 1, "exactly one overlapping submission may commit");
    assert_eq!(conflicts, 3);
    assert_eq!(engine.booking_count().await, 1);
}

#[tokio::test]
async fn committed_mutations_notify_in_order() {
    let dir = test_data_dir("notify");
    let sessions = manager(dir);
    let api = BookingApi::new(sessions.get_or_create("traveler").unwrap(), Latency::None);
    let property_id = fixture_catalog().all()[0].id;

    let mut rx = api.subscribe();

    let booking = api
        .create_booking(CreateBookingInput {
            property_id,
            stay: stay(5, 12),
            guests: 2,
        })
        .await
        .unwrap();
    api.update_booking(booking.id, BookingPatch {
        stay: None,
        guests: Some(3),
    })
    .await
    .unwrap();
    api.cancel_booking(booking.id).await.unwrap();

    assert!(matches!(
        rx.recv().await.unwrap(),
        BookingEvent::Created { .. }
    ));
    assert!(matches!(
        rx.recv().await.unwrap(),
        BookingEvent::Updated { .. }
    ));
    assert!(matches!(
        rx.recv().await.unwrap(),
        BookingEvent::Cancelled { .. }
    ));
}
