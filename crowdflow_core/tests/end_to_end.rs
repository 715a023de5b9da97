//! Four arrivals into one cell with a crowd limit of two.

use async_trait::async_trait;
use crowdflow_core::grid::{LAT_STEP, LNG_STEP};
use crowdflow_core::{CellId, CrowdConfig, CrowdService, GeoPoint, LocationUpdate, PathOutcome, StatusQuery};
use crowdflow_env::{CrowdContext, ParticipantId};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

struct ManualClock {
    secs: AtomicU64,
}

#[async_trait]
impl CrowdContext for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_secs(self.secs.load(Ordering::SeqCst))
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH + self.now()
    }

    async fn sleep(&self, duration: Duration) {
        self.secs.fetch_add(duration.as_secs(), Ordering::SeqCst);
    }

    fn derive_rng(&self, seed_extension: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7u64.wrapping_add(seed_extension))
    }

    fn seed(&self) -> u64 {
        7
    }
}

fn query(id: &str, point: GeoPoint) -> StatusQuery {
    StatusQuery {
        participant_id: ParticipantId::new(id),
        lat: point.lat,
        lng: point.lng,
        target: None,
        auto_route: false,
    }
}

#[test]
fn test_late_arrival_is_alerted_and_routed_out() {
    let clock = Arc::new(ManualClock {
        secs: AtomicU64::new(0),
    });
    let config = CrowdConfig {
        crowd_limit: 2,
        ..CrowdConfig::interactive()
    };
    let service = CrowdService::new(clock.clone(), config);

    let crowded = CellId::new(10, 10);
    let spot = GeoPoint::new(10.3 * LAT_STEP, 10.6 * LNG_STEP);
    assert_eq!(spot.cell(), crowded);

    for (id, t) in [("a", 0), ("b", 1), ("c", 2), ("d", 19)] {
        clock.secs.store(t, Ordering::SeqCst);
        service
            .ingest_location(LocationUpdate {
                participant_id: ParticipantId::new(id),
                lat: spot.lat,
                lng: spot.lng,
            })
            .unwrap();
    }

    let first = service.query_status(query("a", spot)).unwrap();
    assert_eq!(first.rank, 1);
    assert!(first.is_crowded);
    assert!(!first.should_alert);
    assert!(first.recommendation.is_none());

    let last = service.query_status(query("d", spot)).unwrap();
    assert_eq!(last.occupancy, 4);
    assert_eq!(last.rank, 4);
    assert!(last.is_crowded);
    assert!(last.should_alert);

    let rec = last.recommendation.expect("an alerted participant gets a recommendation");
    assert_ne!(rec.cell, crowded);
    assert_eq!(rec.cell.grid_distance_sq(&crowded), 1, "empty neighbours are preferred");
    let occupancy = service.occupancy_snapshot();
    assert_eq!(occupancy.get(rec.cell), 0);

    let path = last.path.expect("the recommendation is routed");
    assert_eq!(path.outcome, PathOutcome::Found);
    assert_eq!(path.points.first().copied(), Some(spot));
    assert_eq!(path.points.last().copied(), Some(rec.center));
    assert_eq!(path.cells.iter().filter(|c| **c == crowded).count(), 1);

    let reservations = service.reservations();
    assert_eq!(reservations.len(), 1);
    assert_eq!(reservations[0].participant_id, ParticipantId::new("d"));
    assert_eq!(reservations[0].cell, rec.cell);
}

#[test]
fn test_alert_window_closes_after_twenty_seconds() {
    let clock = Arc::new(ManualClock {
        secs: AtomicU64::new(0),
    });
    let config = CrowdConfig {
        crowd_limit: 2,
        ..CrowdConfig::interactive()
    };
    let service = CrowdService::new(clock.clone(), config);
    let spot = GeoPoint::new(10.5 * LAT_STEP, 10.5 * LNG_STEP);

    for id in ["a", "b", "c"] {
        service.query_status(query(id, spot)).unwrap();
    }
    assert!(service.query_status(query("c", spot)).unwrap().should_alert);

    clock.secs.store(20, Ordering::SeqCst);
    let report = service.query_status(query("c", spot)).unwrap();
    assert_eq!(report.rank, 3);
    assert!(report.is_crowded);
    assert!(!report.should_alert);
}
