//! The CrowdService - owns the shared stores and serves every request.
//!
//! Each subsystem sits behind its own lock. A request takes them in a fixed
//! order (presence, then reservations, then the tie-break) and never holds
//! one across an `.await`.
//!
//! # Status flow
//!
//! ```text
//! StatusQuery
//!     │
//!     ├─ validate ── RequestError (nothing stored)
//!     ├─ presence lock: upsert own fix, evict stale, snapshot
//!     ├─ occupancy map + rank/alert + nearby list
//!     ├─ ledger lock: prune, sticky check → choose → reserve
//!     └─ A* over the snapshot toward the chosen target
//! ```

use crate::api::{
    validate_fix, validate_point, LocationAck, LocationUpdate, NearbyParticipant, SectorReportRequest, ServiceStats,
    StatusQuery, StatusReport,
};
use crate::config::CrowdConfig;
use crate::density::{occupancy, OccupancyMap};
use crate::error::RequestError;
use crate::grid::GeoPoint;
use crate::pathfind::{PathOutcome, SafestPathFinder};
use crate::presence::PresenceStore;
use crate::rank::assess;
use crate::recommend::{RecommendationEngine, SeededTieBreak, TieBreak};
use crate::reservation::{Reservation, ReservationLedger};
use crate::sectors::{ReportSource, SectorReport, SectorReports};
use crowdflow_env::{
    CollaboratorError, CrowdContext, DensityClassifier, DensityLevel, NoZones, ParticipantId, ZoneLookup,
};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// RNG stream reserved for the recommendation tie-break.
const TIE_BREAK_STREAM: u64 = 0x7469_6562;

/// Shared crowd state plus the request handlers.
///
/// Generic over the context so the same service runs against the tokio
/// clock in production and the virtual clock in simulation.
pub struct CrowdService<Ctx: CrowdContext> {
    context: Arc<Ctx>,
    config: CrowdConfig,
    recommender: RecommendationEngine,
    pathfinder: SafestPathFinder,

    zones: Arc<dyn ZoneLookup>,
    classifier: Option<Arc<dyn DensityClassifier>>,

    presence: Mutex<PresenceStore>,
    reservations: Mutex<ReservationLedger>,
    tie_break: Mutex<Box<dyn TieBreak>>,
    crowd_limit: RwLock<usize>,
    sectors: RwLock<SectorReports>,
}

impl<Ctx: CrowdContext> CrowdService<Ctx> {
    /// Creates a service with no zone table and no classifier.
    ///
    /// The tie-break is seeded from the context, so a simulation run with a
    /// fixed seed makes the same recommendations every time.
    pub fn new(context: Arc<Ctx>, config: CrowdConfig) -> Self {
        let tie_break = SeededTieBreak::new(context.derive_rng(TIE_BREAK_STREAM));

        Self {
            recommender: RecommendationEngine::new(config.recommender.clone()),
            pathfinder: SafestPathFinder::new(config.max_path_iterations),
            zones: Arc::new(NoZones),
            classifier: None,
            presence: Mutex::new(PresenceStore::new()),
            reservations: Mutex::new(ReservationLedger::new()),
            tie_break: Mutex::new(Box::new(tie_break)),
            crowd_limit: RwLock::new(config.crowd_limit),
            sectors: RwLock::new(SectorReports::new()),
            context,
            config,
        }
    }

    pub fn with_zones(mut self, zones: Arc<dyn ZoneLookup>) -> Self {
        self.zones = zones;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn DensityClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Replace the recommendation tie-break (e.g. [`FirstChoice`](crate::recommend::FirstChoice)).
    pub fn with_tie_break(self, tie_break: Box<dyn TieBreak>) -> Self {
        *lock(&self.tie_break) = tie_break;
        self
    }

    pub fn context(&self) -> &Arc<Ctx> {
        &self.context
    }

    pub fn config(&self) -> &CrowdConfig {
        &self.config
    }

    // ========================================================================
    // LOCATION INGESTION
    // ========================================================================

    /// Store a participant's position fix.
    pub fn ingest_location(&self, update: LocationUpdate) -> Result<LocationAck, RequestError> {
        let point = validate_fix(&update.participant_id, update.lat, update.lng)?;
        let now = self.context.now();

        let outcome = lock(&self.presence).upsert(&update.participant_id, point.lat, point.lng, now);
        debug!("Location from {}: {:?}", update.participant_id, outcome);

        let (zone, zone_error) = match self.zones.zone_of(point.lat, point.lng) {
            Ok(zone) => (zone, None),
            Err(e) => {
                warn!("Zone lookup failed for {}: {}", update.participant_id, e);
                (None, Some(e.to_string()))
            }
        };

        Ok(LocationAck {
            participant_id: update.participant_id,
            cell: point.cell(),
            zone,
            zone_error,
        })
    }

    // ========================================================================
    // STATUS QUERY
    // ========================================================================

    /// Rank, alert, nearby list, recommendation and safest path for one
    /// participant.
    ///
    /// The requester's own fix is written before anything is read, so they
    /// always appear in the snapshot they are ranked against.
    pub fn query_status(&self, query: StatusQuery) -> Result<StatusReport, RequestError> {
        let here = validate_fix(&query.participant_id, query.lat, query.lng)?;
        let target = query.target.map(validate_point).transpose()?;

        let now = self.context.now();
        let crowd_limit = self.crowd_limit();
        let cell = here.cell();

        let live = {
            let mut presence = lock(&self.presence);
            presence.upsert(&query.participant_id, here.lat, here.lng, now);
            presence.snapshot_live(now, self.config.presence_ttl)
        };
        let occupancy_map = occupancy(&live);

        let assessment = assess(
            &query.participant_id,
            cell,
            &live,
            &occupancy_map,
            crowd_limit,
            now,
            self.config.new_arrival_window,
        );

        let mut nearby: Vec<NearbyParticipant> = live
            .iter()
            .filter(|r| r.participant_id != query.participant_id)
            .filter_map(|r| {
                let distance_m = here.distance_m(&r.position());
                (distance_m <= self.config.nearby_radius_m).then(|| NearbyParticipant {
                    participant_id: r.participant_id.clone(),
                    lat: r.lat,
                    lng: r.lng,
                    distance_m,
                })
            })
            .collect();
        nearby.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));

        let recommendation = if assessment.should_alert || query.auto_route {
            let mut ledger = lock(&self.reservations);
            ledger.prune_expired(now, self.config.reservation_ttl);
            let mut tie_break = lock(&self.tie_break);
            self.recommender.recommend(
                &query.participant_id,
                cell,
                &occupancy_map,
                &mut ledger,
                crowd_limit,
                now,
                self.config.reservation_ttl,
                &mut **tie_break,
            )
        } else {
            None
        };

        if assessment.should_alert {
            info!(
                "Alert for {} in {} (rank {}, occupancy {}, limit {})",
                query.participant_id, cell, assessment.rank, assessment.occupancy, crowd_limit
            );
        }

        let recommended = recommendation.map(|r| r.center);
        let goal = if query.auto_route {
            recommended.or(target)
        } else {
            target.or(recommended)
        };

        let path = goal.map(|goal| self.pathfinder.find_path(here, goal, &occupancy_map, crowd_limit));
        if let Some(p) = &path {
            if p.outcome == PathOutcome::Fallback {
                warn!("Straight-line route for {} after {} expansions", query.participant_id, p.expansions);
            }
        }

        Ok(StatusReport {
            participant_id: query.participant_id,
            cell,
            occupancy: assessment.occupancy,
            rank: assessment.rank,
            is_crowded: assessment.is_crowded,
            should_alert: assessment.should_alert,
            crowd_limit,
            nearby,
            occupancy_window: occupancy_map.window(cell, self.config.status_window),
            recommendation,
            path,
        })
    }

    // ========================================================================
    // SECTOR REPORTS
    // ========================================================================

    /// Store a manual density report for a section.
    pub fn report_density(&self, request: SectorReportRequest) -> Result<SectorReport, RequestError> {
        let section_id = request.section_id.trim();
        if section_id.is_empty() {
            return Err(RequestError::InvalidDensityReport("missing section id".to_string()));
        }
        let level = DensityLevel::try_from(request.level).map_err(RequestError::InvalidDensityReport)?;

        Ok(self.store_report(section_id, level, ReportSource::Manual))
    }

    /// Ask the image classifier for a section's density and store its label.
    ///
    /// A classifier failure is returned to this caller only; the overlay is
    /// left unchanged.
    pub async fn classify_sector(&self, section_id: &str, image: &[u8]) -> Result<SectorReport, RequestError> {
        let section_id = section_id.trim();
        if section_id.is_empty() {
            return Err(RequestError::InvalidDensityReport("missing section id".to_string()));
        }

        let classifier = self
            .classifier
            .clone()
            .ok_or_else(|| CollaboratorError::unavailable("no density classifier configured"))?;

        let level = classifier.classify(image).await.map_err(|e| {
            warn!("Density classifier failed for section {}: {}", section_id, e);
            RequestError::from(e)
        })?;

        Ok(self.store_report(section_id, level, ReportSource::Classifier))
    }

    pub fn sector_reports(&self) -> Vec<SectorReport> {
        read(&self.sectors).all()
    }

    fn store_report(&self, section_id: &str, level: DensityLevel, source: ReportSource) -> SectorReport {
        let report = SectorReport {
            section_id: section_id.to_string(),
            level,
            source,
            reported_at: self.context.system_time(),
        };
        write(&self.sectors).record(report.clone());
        debug!("Sector {} reported {:?} ({:?})", section_id, level, source);
        report
    }

    // ========================================================================
    // ADMIN
    // ========================================================================

    /// Parse and apply a new crowd limit. Rejected values leave the old one.
    pub fn set_crowd_limit(&self, value: &str) -> Result<usize, RequestError> {
        let limit: usize = value
            .trim()
            .parse()
            .map_err(|_| RequestError::InvalidSetting(format!("crowd limit must be a non-negative integer, got {:?}", value)))?;

        let previous = std::mem::replace(&mut *write(&self.crowd_limit), limit);
        info!("Crowd limit changed from {} to {}", previous, limit);
        Ok(limit)
    }

    pub fn crowd_limit(&self) -> usize {
        *read(&self.crowd_limit)
    }

    /// Occupancy of the live snapshot, evicting stale records on the way.
    pub fn occupancy_snapshot(&self) -> OccupancyMap {
        let live = lock(&self.presence).snapshot_live(self.context.now(), self.config.presence_ttl);
        occupancy(&live)
    }

    /// Live reservations, for metrics and tests.
    pub fn reservations(&self) -> Vec<Reservation> {
        let now = self.context.now();
        let mut ledger = lock(&self.reservations);
        ledger.prune_expired(now, self.config.reservation_ttl);
        ledger.iter().cloned().collect()
    }

    /// Live location of one participant, if any.
    pub fn position_of(&self, participant_id: &ParticipantId) -> Option<GeoPoint> {
        let now = self.context.now();
        lock(&self.presence)
            .get(participant_id)
            .filter(|r| r.is_live(now, self.config.presence_ttl))
            .map(|r| r.position())
    }

    pub fn stats(&self) -> ServiceStats {
        let occupancy_map = self.occupancy_snapshot();
        ServiceStats {
            live_participants: occupancy_map.total(),
            occupied_cells: occupancy_map.occupied_cells(),
            reservations: self.reservations().len(),
            sector_reports: read(&self.sectors).len(),
            crowd_limit: self.crowd_limit(),
        }
    }
}

// Every store stays structurally valid if a holder panics, so a poisoned
// lock is taken over rather than propagated.
fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn read<T>(l: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(l: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CellId, LAT_STEP, LNG_STEP};
    use crate::recommend::FirstChoice;
    use crate::zones::PolygonZoneTable;
    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{Duration, SystemTime};

    /// Manually driven clock.
    struct TestContext {
        millis: AtomicU64,
    }

    impl TestContext {
        fn shared() -> Arc<Self> {
            Arc::new(Self {
                millis: AtomicU64::new(0),
            })
        }

        fn set_secs(&self, secs: u64) {
            self.millis.store(secs * 1000, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl CrowdContext for TestContext {
        fn now(&self) -> Duration {
            Duration::from_millis(self.millis.load(Ordering::SeqCst))
        }

        fn system_time(&self) -> SystemTime {
            SystemTime::UNIX_EPOCH + self.now()
        }

        async fn sleep(&self, duration: Duration) {
            self.millis.fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
        }

        fn derive_rng(&self, seed_extension: u64) -> ChaCha8Rng {
            ChaCha8Rng::seed_from_u64(42 ^ seed_extension)
        }

        fn seed(&self) -> u64 {
            42
        }
    }

    struct FixedClassifier(Result<DensityLevel, CollaboratorError>);

    #[async_trait]
    impl DensityClassifier for FixedClassifier {
        async fn classify(&self, _image: &[u8]) -> Result<DensityLevel, CollaboratorError> {
            self.0.clone()
        }
    }

    /// Centre of cell (row, col).
    fn at(row: i64, col: i64) -> (f64, f64) {
        ((row as f64 + 0.5) * LAT_STEP, (col as f64 + 0.5) * LNG_STEP)
    }

    fn service(limit: usize) -> (Arc<TestContext>, CrowdService<TestContext>) {
        let ctx = TestContext::shared();
        let config = CrowdConfig {
            crowd_limit: limit,
            ..CrowdConfig::interactive()
        };
        (ctx.clone(), CrowdService::new(ctx, config))
    }

    fn status(id: &str, (lat, lng): (f64, f64)) -> StatusQuery {
        StatusQuery {
            participant_id: ParticipantId::new(id),
            lat,
            lng,
            target: None,
            auto_route: false,
        }
    }

    fn update(id: &str, (lat, lng): (f64, f64)) -> LocationUpdate {
        LocationUpdate {
            participant_id: ParticipantId::new(id),
            lat,
            lng,
        }
    }

    #[test]
    fn test_invalid_requests_store_nothing() {
        let (_ctx, svc) = service(2);

        assert_eq!(
            svc.ingest_location(update("", at(0, 0))),
            Err(RequestError::MissingParticipantId)
        );
        assert!(matches!(
            svc.query_status(status("p1", (f64::INFINITY, 0.0))),
            Err(RequestError::InvalidCoordinates(_))
        ));

        let mut bad_target = status("p2", at(0, 0));
        bad_target.target = Some(GeoPoint::new(95.0, 0.0));
        assert!(svc.query_status(bad_target).is_err());

        assert_eq!(svc.stats().live_participants, 0);
    }

    #[test]
    fn test_ingest_reports_zone() {
        let (lat, lng) = at(3, 3);
        let outline = [
            GeoPoint::new(lat - 0.001, lng - 0.001),
            GeoPoint::new(lat - 0.001, lng + 0.001),
            GeoPoint::new(lat + 0.001, lng + 0.001),
            GeoPoint::new(lat + 0.001, lng - 0.001),
        ];
        let zones = PolygonZoneTable::new().with_zone("gate-a", &outline).unwrap();
        let (_ctx, svc) = service(2);
        let svc = svc.with_zones(Arc::new(zones));

        let ack = svc.ingest_location(update("p1", (lat, lng))).unwrap();
        assert_eq!(ack.cell, CellId::new(3, 3));
        assert_eq!(ack.zone.as_deref(), Some("gate-a"));
        assert!(ack.zone_error.is_none());

        let ack = svc.ingest_location(update("p1", at(50, 50))).unwrap();
        assert!(ack.zone.is_none());
    }

    #[test]
    fn test_zone_failure_does_not_abort_ingest() {
        struct BrokenZones;
        impl ZoneLookup for BrokenZones {
            fn zone_of(&self, _lat: f64, _lng: f64) -> Result<Option<String>, CollaboratorError> {
                Err(CollaboratorError::unavailable("zone table offline"))
            }
        }

        let (_ctx, svc) = service(2);
        let svc = svc.with_zones(Arc::new(BrokenZones));

        let ack = svc.ingest_location(update("p1", at(0, 0))).unwrap();
        assert!(ack.zone.is_none());
        assert!(ack.zone_error.unwrap().contains("offline"));
        assert_eq!(svc.stats().live_participants, 1);
    }

    #[test]
    fn test_quiet_cell_has_no_alert_or_recommendation() {
        let (_ctx, svc) = service(2);
        let report = svc.query_status(status("p1", at(0, 0))).unwrap();

        assert_eq!(report.rank, 1);
        assert_eq!(report.occupancy, 1);
        assert!(!report.is_crowded);
        assert!(!report.should_alert);
        assert!(report.recommendation.is_none());
        assert!(report.path.is_none());
        assert_eq!(report.crowd_limit, 2);
        assert_eq!(report.occupancy_window.len(), 121);
    }

    #[test]
    fn test_alert_gets_recommendation_and_path() {
        let (ctx, svc) = service(2);
        let svc = svc.with_tie_break(Box::new(FirstChoice));

        for (i, t) in [0, 1, 2].iter().enumerate() {
            ctx.set_secs(*t);
            svc.ingest_location(update(&format!("p{}", i), at(10, 10))).unwrap();
        }
        ctx.set_secs(3);
        let report = svc.query_status(status("late", at(10, 10))).unwrap();

        assert!(report.should_alert);
        assert_eq!(report.rank, 4);
        let rec = report.recommendation.unwrap();
        assert_eq!(rec.projected_load, 0);
        assert_eq!(rec.cell.grid_distance_sq(&CellId::new(10, 10)), 1);

        let path = report.path.unwrap();
        assert_eq!(path.points.first().copied(), Some(GeoPoint::new(at(10, 10).0, at(10, 10).1)));
        assert_eq!(path.points.last().copied(), Some(rec.center));
        assert_eq!(svc.reservations().len(), 1);
    }

    #[test]
    fn test_explicit_target_routes_without_alert() {
        let (_ctx, svc) = service(2);
        let mut q = status("p1", at(0, 0));
        let (lat, lng) = at(0, 3);
        q.target = Some(GeoPoint::new(lat, lng));

        let report = svc.query_status(q).unwrap();
        assert!(report.recommendation.is_none());
        let path = report.path.unwrap();
        assert_eq!(path.outcome, PathOutcome::Found);
        assert_eq!(path.points.last().copied(), Some(GeoPoint::new(lat, lng)));
    }

    #[test]
    fn test_auto_route_prefers_recommendation() {
        let (_ctx, svc) = service(2);
        let svc = svc.with_tie_break(Box::new(FirstChoice));
        let mut q = status("p1", at(0, 0));
        q.target = Some(GeoPoint::new(at(0, 8).0, at(0, 8).1));
        q.auto_route = true;

        let report = svc.query_status(q).unwrap();
        let rec = report.recommendation.unwrap();
        assert_eq!(report.path.unwrap().points.last().copied(), Some(rec.center));
    }

    #[test]
    fn test_nearby_excludes_self_and_far_participants() {
        let (_ctx, svc) = service(5);
        svc.ingest_location(update("near", at(0, 1))).unwrap();
        svc.ingest_location(update("far", at(40, 40))).unwrap();

        let report = svc.query_status(status("me", at(0, 0))).unwrap();
        let ids: Vec<&str> = report.nearby.iter().map(|n| n.participant_id.as_str()).collect();
        assert_eq!(ids, vec!["near"]);
        assert!(report.nearby[0].distance_m > 40.0 && report.nearby[0].distance_m < 60.0);
    }

    #[test]
    fn test_stale_presence_is_evicted() {
        let (ctx, svc) = service(2);
        svc.ingest_location(update("p1", at(0, 0))).unwrap();

        ctx.set_secs(45);
        assert_eq!(svc.stats().live_participants, 1);
        ctx.set_secs(46);
        assert_eq!(svc.stats().live_participants, 0);
        assert!(svc.position_of(&ParticipantId::new("p1")).is_none());
    }

    #[test]
    fn test_set_crowd_limit() {
        let (_ctx, svc) = service(5);

        assert_eq!(svc.set_crowd_limit(" 3 "), Ok(3));
        assert_eq!(svc.crowd_limit(), 3);

        for bad in ["", "-1", "2.5", "many"] {
            assert!(matches!(svc.set_crowd_limit(bad), Err(RequestError::InvalidSetting(_))));
        }
        assert_eq!(svc.crowd_limit(), 3);

        assert_eq!(svc.set_crowd_limit("0"), Ok(0));
    }

    #[test]
    fn test_report_density() {
        let (_ctx, svc) = service(5);

        let stored = svc
            .report_density(SectorReportRequest {
                section_id: "B2".to_string(),
                level: 3,
            })
            .unwrap();
        assert_eq!(stored.level, DensityLevel::High);
        assert_eq!(stored.source, ReportSource::Manual);

        for (section, level) in [("B2", 0), ("B2", 4), ("  ", 2)] {
            let err = svc
                .report_density(SectorReportRequest {
                    section_id: section.to_string(),
                    level,
                })
                .unwrap_err();
            assert!(matches!(err, RequestError::InvalidDensityReport(_)));
        }
        assert_eq!(svc.sector_reports().len(), 1);
    }

    #[tokio::test]
    async fn test_classify_sector() {
        let (_ctx, svc) = service(5);
        let svc = svc.with_classifier(Arc::new(FixedClassifier(Ok(DensityLevel::Medium))));

        let report = svc.classify_sector("C7", b"jpeg").await.unwrap();
        assert_eq!(report.level, DensityLevel::Medium);
        assert_eq!(report.source, ReportSource::Classifier);
        assert_eq!(svc.sector_reports(), vec![report]);
    }

    #[tokio::test]
    async fn test_classifier_failure_stores_nothing() {
        let (_ctx, svc) = service(5);
        let err = svc.classify_sector("C7", b"jpeg").await.unwrap_err();
        assert!(matches!(err, RequestError::Classifier(CollaboratorError::Unavailable(_))));

        let svc = svc.with_classifier(Arc::new(FixedClassifier(Err(CollaboratorError::Timeout(500)))));
        let err = svc.classify_sector("C7", b"jpeg").await.unwrap_err();
        assert_eq!(err, RequestError::Classifier(CollaboratorError::Timeout(500)));
        assert!(svc.sector_reports().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_alerts_never_overfill_a_cell() {
        let limit = 3;
        let (_ctx, svc) = service(limit);
        let svc = Arc::new(svc);

        // Pack the origin cell and surround it with a ring that is one short of the limit
        for i in 0..10 {
            svc.ingest_location(update(&format!("early{}", i), at(0, 0))).unwrap();
        }
        let origin = CellId::new(0, 0);
        for (n, cell) in origin.window(1).filter(|c| *c != origin).enumerate() {
            for j in 0..(limit - 1) {
                svc.ingest_location(update(&format!("ring{}_{}", n, j), at(cell.row, cell.col)))
                    .unwrap();
            }
        }

        let mut handles = Vec::new();
        for i in 0..32 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move { svc.query_status(status(&format!("late{}", i), at(0, 0))) }));
        }
        for handle in handles {
            let report = handle.await.unwrap().unwrap();
            assert!(report.should_alert);
        }

        let occupancy_map = svc.occupancy_snapshot();
        let mut claims: HashMap<CellId, usize> = HashMap::new();
        for r in svc.reservations() {
            *claims.entry(r.cell).or_default() += 1;
        }
        for (cell, n) in claims {
            assert!(occupancy_map.get(cell) + n <= limit, "cell {} overfilled", cell);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_polls_from_one_participant_hold_one_reservation() {
        let (_ctx, svc) = service(2);
        let svc = Arc::new(svc);
        for i in 0..5 {
            svc.ingest_location(update(&format!("early{}", i), at(0, 0))).unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..32 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move { svc.query_status(status("late", at(0, 0))) }));
        }
        let mut recommended = Vec::new();
        for handle in handles {
            let report = handle.await.unwrap().unwrap();
            assert!(report.should_alert);
            recommended.push(report.recommendation.unwrap().cell);
        }

        let held: Vec<Reservation> = svc
            .reservations()
            .into_iter()
            .filter(|r| r.participant_id == ParticipantId::new("late"))
            .collect();
        assert_eq!(held.len(), 1);
        assert_eq!(svc.reservations().len(), 1);
        // Every poll after the first re-validates the same claim
        assert!(recommended.iter().all(|cell| *cell == held[0].cell), "{:?}", recommended);
    }
}
