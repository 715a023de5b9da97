//! SimWorld - The simulation harness container.

use crate::context::SimContext;
use crate::crowd::CrowdOracle;
use crate::error::SimError;

use crowdflow_core::{CellId, CrowdConfig, CrowdService, GeoPoint, LocationUpdate, StatusQuery, StatusReport};
use crowdflow_env::{CrowdContext, ParticipantId};
use std::sync::Arc;
use std::time::Duration;

/// Main gate of the simulated venue (a stadium forecourt).
pub const VENUE_GATE: GeoPoint = GeoPoint {
    lat: 51.556_0,
    lng: -0.279_5,
};

/// RNG stream for the oracle, kept apart from the service's tie-break stream.
const ORACLE_STREAM: u64 = 0x9e37_79b9_7f4a_7c15;

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Crowd limit handed to the service
    pub crowd_limit: usize,

    /// Seconds of virtual time per tick (also the phones' polling interval)
    pub tick_secs: f64,

    /// Maximum simulation duration in seconds
    pub max_duration_secs: f64,

    /// GPS noise standard deviation in metres
    pub gps_noise_m: f64,

    /// Walking speed toward a target in m/s
    pub walking_speed_mps: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            crowd_limit: 5,
            tick_secs: 1.0,
            max_duration_secs: 60.0,
            gps_noise_m: 2.0,
            walking_speed_mps: 1.4,
        }
    }
}

/// The SimWorld - virtual clock, crowd service and ground truth in one place.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,

    /// Shared simulation context (virtual clock)
    pub context: Arc<SimContext>,

    /// Service under test, running in simulation mode
    pub service: CrowdService<SimContext>,

    /// Ground truth oracle
    pub oracle: CrowdOracle,

    /// Current tick count
    tick_count: u64,
}

impl SimWorld {
    /// Creates a new SimWorld with the given configuration.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        let context = SimContext::shared(config.seed);

        let service_config = CrowdConfig {
            crowd_limit: config.crowd_limit,
            ..CrowdConfig::simulation()
        };
        let service = CrowdService::new(context.clone(), service_config);

        let mut oracle = CrowdOracle::new(context.derive_rng(ORACLE_STREAM));
        oracle.set_gps_noise(config.gps_noise_m)?;
        oracle.set_walking_speed(config.walking_speed_mps);

        Ok(Self {
            config,
            context,
            service,
            oracle,
            tick_count: 0,
        })
    }

    /// Cell of the venue's main gate.
    pub fn gate(&self) -> CellId {
        VENUE_GATE.cell()
    }

    /// Advances virtual time and walker positions by one tick.
    pub async fn tick(&mut self) {
        let dt = self.config.tick_secs;
        self.context.sleep(Duration::from_secs_f64(dt)).await;
        self.oracle.step(dt);
        self.tick_count += 1;
    }

    /// Sends a location update for every reporting walker.
    pub fn report_all(&mut self) -> Result<usize, SimError> {
        let fixes = self.oracle.fixes();
        let count = fixes.len();
        for (participant_id, fix) in fixes {
            self.service.ingest_location(LocationUpdate {
                participant_id,
                lat: fix.lat,
                lng: fix.lng,
            })?;
        }
        Ok(count)
    }

    /// One status poll from a walker's phone, using a fresh noisy fix.
    pub fn poll(&mut self, participant_id: &ParticipantId) -> Result<StatusReport, SimError> {
        let fix = self
            .oracle
            .fix(participant_id)
            .ok_or_else(|| SimError::UnknownParticipant(participant_id.clone()))?;

        Ok(self.service.query_status(StatusQuery {
            participant_id: participant_id.clone(),
            lat: fix.lat,
            lng: fix.lng,
            target: None,
            auto_route: false,
        })?)
    }

    /// Returns the current simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.context.now().as_secs_f64()
    }

    /// Returns the current tick count.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Number of ticks that fit into the configured duration.
    pub fn max_ticks(&self) -> u64 {
        (self.config.max_duration_secs / self.config.tick_secs).floor() as u64
    }
}
