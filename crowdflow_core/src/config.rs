//! Tunables for the crowd service.

use crate::pathfind::MAX_ITERATIONS;
use crate::presence::{INTERACTIVE_PRESENCE_TTL, SIMULATION_PRESENCE_TTL};
use crate::rank::NEW_ARRIVAL_WINDOW;
use crate::recommend::RecommenderConfig;
use crate::reservation::RESERVATION_TTL;
use std::time::Duration;

/// Configuration for a CrowdService.
///
/// Everything here is fixed at construction except the crowd limit, which
/// only seeds the service's mutable administrative setting.
#[derive(Debug, Clone)]
pub struct CrowdConfig {
    /// Initial crowd limit per cell (default: 5)
    pub crowd_limit: usize,

    /// Inactivity threshold before a presence record is evicted (default: 45s)
    pub presence_ttl: Duration,

    /// Lifetime of an advisory reservation (default: 15s)
    pub reservation_ttl: Duration,

    /// Window after joining a cell during which alerts fire (default: 20s)
    pub new_arrival_window: Duration,

    /// Recommendation search window and tie-break spread
    pub recommender: RecommenderConfig,

    /// Half-width of the occupancy snapshot returned to a requester (default: 5)
    pub status_window: u32,

    /// Radius of the nearby-participant list in meters (default: 100)
    pub nearby_radius_m: f64,

    /// A* expansion cap (default: 500)
    pub max_path_iterations: usize,
}

impl CrowdConfig {
    /// Settings for phones polling a live venue.
    pub fn interactive() -> Self {
        Self {
            crowd_limit: 5,
            presence_ttl: INTERACTIVE_PRESENCE_TTL,
            reservation_ttl: RESERVATION_TTL,
            new_arrival_window: NEW_ARRIVAL_WINDOW,
            recommender: RecommenderConfig::default(),
            status_window: 5,
            nearby_radius_m: 100.0,
            max_path_iterations: MAX_ITERATIONS,
        }
    }

    /// Settings for the simplified simulation mode: shorter presence TTL and
    /// a wider recommendation window.
    pub fn simulation() -> Self {
        Self {
            presence_ttl: SIMULATION_PRESENCE_TTL,
            recommender: RecommenderConfig {
                radius: 10,
                ..RecommenderConfig::default()
            },
            ..Self::interactive()
        }
    }
}

impl Default for CrowdConfig {
    fn default() -> Self {
        Self::interactive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_presets() {
        let interactive = CrowdConfig::default();
        assert_eq!(interactive.presence_ttl, Duration::from_secs(45));
        assert_eq!(interactive.reservation_ttl, Duration::from_secs(15));
        assert_eq!(interactive.new_arrival_window, Duration::from_secs(20));
        assert_eq!(interactive.max_path_iterations, 500);

        let sim = CrowdConfig::simulation();
        assert_eq!(sim.presence_ttl, Duration::from_secs(30));
        assert_eq!(sim.recommender.radius, 10);
        assert_eq!(sim.crowd_limit, interactive.crowd_limit);
    }
}
