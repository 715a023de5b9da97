//! Ground truth for a simulated crowd.
//!
//! The CrowdOracle holds the "God's eye view" of the venue:
//! - True positions of every walker (degrees, `[lat, lng]`)
//! - Movement (straight walk toward a target, or a random drift)
//! - Phone fixes generated from the truth with Gaussian GPS noise

use crate::error::SimError;
use crowdflow_core::grid::{LAT_STEP, LNG_STEP};
use crowdflow_core::{CellId, GeoPoint, OccupancyMap};
use crowdflow_env::ParticipantId;
use nalgebra::Vector2;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use std::collections::HashMap;

/// Rough length of one degree, used to turn metres into degrees.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// A simulated participant.
#[derive(Debug, Clone)]
pub struct Walker {
    pub id: ParticipantId,

    /// True position `[lat, lng]` in degrees
    pub position: Vector2<f64>,

    /// Where the walker is heading, if anywhere
    pub target: Option<Vector2<f64>>,

    /// A silent walker keeps moving but its phone stops reporting
    pub reporting: bool,
}

impl Walker {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.position.x, self.position.y)
    }

    pub fn cell(&self) -> CellId {
        self.point().cell()
    }
}

/// The CrowdOracle - ground truth plus noisy phone fixes.
pub struct CrowdOracle {
    rng: ChaCha8Rng,
    walkers: Vec<Walker>,
    index: HashMap<ParticipantId, usize>,

    /// GPS error per axis (standard deviation, degrees)
    gps_noise_deg: f64,

    /// Drift per axis for walkers without a target (degrees per second)
    wander_deg: f64,

    walking_speed_mps: f64,
    current_time: f64,
}

impl CrowdOracle {
    /// Creates an oracle drawing all randomness from `rng`.
    ///
    /// Defaults: 2 m GPS noise, 1.4 m/s walking speed, no drift.
    pub fn new(rng: ChaCha8Rng) -> Self {
        Self {
            rng,
            walkers: Vec::new(),
            index: HashMap::new(),
            gps_noise_deg: 2.0 / METERS_PER_DEGREE,
            wander_deg: 0.0,
            walking_speed_mps: 1.4,
            current_time: 0.0,
        }
    }

    /// Sets the GPS noise standard deviation in metres.
    pub fn set_gps_noise(&mut self, std_m: f64) -> Result<(), SimError> {
        self.gps_noise_deg = to_degrees(std_m)?;
        Ok(())
    }

    /// Sets the random drift of idle walkers in metres per second (0 = stand still).
    pub fn set_wander(&mut self, std_mps: f64) -> Result<(), SimError> {
        self.wander_deg = to_degrees(std_mps)?;
        Ok(())
    }

    pub fn set_walking_speed(&mut self, mps: f64) {
        self.walking_speed_mps = mps.max(0.0);
    }

    /// Spawns a walker at an exact point and returns its id.
    pub fn spawn_at(&mut self, point: GeoPoint) -> ParticipantId {
        let id = ParticipantId::new(format!("walker-{:04}", self.walkers.len()));
        self.index.insert(id.clone(), self.walkers.len());
        self.walkers.push(Walker {
            id: id.clone(),
            position: Vector2::new(point.lat, point.lng),
            target: None,
            reporting: true,
        });
        id
    }

    /// Spawns a walker somewhere in the middle half of `cell`, far enough
    /// from the edges that GPS noise does not move its fix to a neighbour.
    pub fn spawn_in_cell(&mut self, cell: CellId) -> ParticipantId {
        let bounds = cell.bounds();
        let lat = bounds.lat_min + self.rng.gen_range(0.25..0.75) * LAT_STEP;
        let lng = bounds.lng_min + self.rng.gen_range(0.25..0.75) * LNG_STEP;
        self.spawn_at(GeoPoint::new(lat, lng))
    }

    /// Sends a walker toward `target`; it stops on arrival.
    pub fn head_to(&mut self, id: &ParticipantId, target: GeoPoint) -> Result<(), SimError> {
        self.walker_mut(id)?.target = Some(Vector2::new(target.lat, target.lng));
        Ok(())
    }

    /// Stops a walker's phone from reporting.
    pub fn silence(&mut self, id: &ParticipantId) -> Result<(), SimError> {
        self.walker_mut(id)?.reporting = false;
        Ok(())
    }

    /// Advances every walker by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        self.current_time += dt;
        let stride_deg = self.walking_speed_mps * dt / METERS_PER_DEGREE;

        for walker in &mut self.walkers {
            match walker.target {
                Some(target) => {
                    let delta = target - walker.position;
                    let remaining = delta.norm();
                    if remaining <= stride_deg {
                        walker.position = target;
                        walker.target = None;
                    } else {
                        walker.position += delta * (stride_deg / remaining);
                    }
                }
                None if self.wander_deg > 0.0 => {
                    walker.position += gaussian2(&mut self.rng, self.wander_deg) * dt;
                }
                None => {}
            }
        }
    }

    /// A noisy fix for one walker, or `None` if it is silent or unknown.
    pub fn fix(&mut self, id: &ParticipantId) -> Option<GeoPoint> {
        let idx = *self.index.get(id)?;
        let walker = &self.walkers[idx];
        if !walker.reporting {
            return None;
        }

        let reported = walker.position + gaussian2(&mut self.rng, self.gps_noise_deg);
        Some(GeoPoint::new(reported.x, reported.y))
    }

    /// Noisy fixes for every reporting walker, in spawn order.
    pub fn fixes(&mut self) -> Vec<(ParticipantId, GeoPoint)> {
        let ids: Vec<ParticipantId> = self.walkers.iter().filter(|w| w.reporting).map(|w| w.id.clone()).collect();
        ids.into_iter()
            .filter_map(|id| self.fix(&id).map(|point| (id, point)))
            .collect()
    }

    pub fn walker(&self, id: &ParticipantId) -> Option<&Walker> {
        self.index.get(id).map(|idx| &self.walkers[*idx])
    }

    /// Occupancy of the true positions, silent walkers included.
    pub fn true_occupancy(&self) -> OccupancyMap {
        let mut counts: HashMap<CellId, usize> = HashMap::new();
        for walker in &self.walkers {
            *counts.entry(walker.cell()).or_default() += 1;
        }
        OccupancyMap::from_counts(counts)
    }

    /// Simulated seconds since the oracle was created.
    pub fn time(&self) -> f64 {
        self.current_time
    }

    fn walker_mut(&mut self, id: &ParticipantId) -> Result<&mut Walker, SimError> {
        let idx = *self
            .index
            .get(id)
            .ok_or_else(|| SimError::UnknownParticipant(id.clone()))?;
        Ok(&mut self.walkers[idx])
    }
}

fn to_degrees(std_m: f64) -> Result<f64, SimError> {
    if std_m.is_finite() && std_m >= 0.0 {
        Ok(std_m / METERS_PER_DEGREE)
    } else {
        Err(SimError::InvalidNoise(format!("standard deviation must be a finite non-negative number of metres, got {}", std_m)))
    }
}

/// Independent zero-mean Gaussian offsets on both axes.
fn gaussian2(rng: &mut ChaCha8Rng, std: f64) -> Vector2<f64> {
    let lat: f64 = rng.sample(StandardNormal);
    let lng: f64 = rng.sample(StandardNormal);
    Vector2::new(lat, lng) * std
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;

    fn oracle(seed: u64) -> CrowdOracle {
        CrowdOracle::new(ChaCha8Rng::seed_from_u64(seed))
    }

    #[test]
    fn test_spawn_in_cell_stays_inside() {
        let mut oracle = oracle(42);
        let cell = CellId::new(114_568, -621);
        for _ in 0..50 {
            let id = oracle.spawn_in_cell(cell);
            assert_eq!(oracle.walker(&id).unwrap().cell(), cell);
        }
        assert_eq!(oracle.true_occupancy().get(cell), 50);
    }

    #[test]
    fn test_walker_reaches_target_and_stops() {
        let mut oracle = oracle(42);
        let start = CellId::new(0, 0).center();
        let goal = CellId::new(0, 1).center();
        let id = oracle.spawn_at(start);
        oracle.head_to(&id, goal).unwrap();

        // ~50 m at 1.4 m/s
        for _ in 0..30 {
            oracle.step(1.0);
        }
        assert_ne!(oracle.walker(&id).unwrap().point(), goal);

        for _ in 0..10 {
            oracle.step(1.0);
        }
        let walker = oracle.walker(&id).unwrap();
        assert_eq!(walker.point(), goal);
        assert!(walker.target.is_none());
    }

    #[test]
    fn test_silent_walker_has_no_fix() {
        let mut oracle = oracle(42);
        let a = oracle.spawn_in_cell(CellId::new(0, 0));
        let b = oracle.spawn_in_cell(CellId::new(0, 0));
        oracle.silence(&a).unwrap();

        assert!(oracle.fix(&a).is_none());
        let fixes = oracle.fixes();
        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[0].0, b);

        let ghost = ParticipantId::new("ghost");
        assert_eq!(oracle.silence(&ghost), Err(SimError::UnknownParticipant(ghost)));
    }

    #[test]
    fn test_noise_is_deterministic_and_small() {
        let mut a = oracle(7);
        let mut b = oracle(7);
        let cell = CellId::new(10, 10);
        let ia = a.spawn_in_cell(cell);
        let ib = b.spawn_in_cell(cell);

        let fa = a.fix(&ia).unwrap();
        let fb = b.fix(&ib).unwrap();
        assert_eq!(fa, fb);

        let truth = a.walker(&ia).unwrap().point();
        assert!(fa.distance_m(&truth) < 20.0);
        assert_ne!(fa, truth);
    }

    proptest! {
        #[test]
        fn prop_spawned_walkers_start_in_their_cell(seed in 0u64..1000, row in -200_000i64..200_000, col in -400_000i64..400_000) {
            let mut oracle = oracle(seed);
            let cell = CellId::new(row, col);
            let id = oracle.spawn_in_cell(cell);
            prop_assert_eq!(oracle.walker(&id).unwrap().cell(), cell);
        }
    }

    #[test]
    fn test_invalid_noise_rejected() {
        let mut oracle = oracle(1);
        assert!(matches!(oracle.set_gps_noise(-1.0), Err(SimError::InvalidNoise(_))));
        assert!(oracle.set_gps_noise(0.0).is_ok());
        assert!(oracle.set_wander(0.0).is_ok());
    }
}
