//! The Recommendation Engine - where should an alerted participant go?
//!
//! Candidates are the cells in a square window around the participant,
//! filtered to those whose projected load (occupancy + live reservations) is
//! strictly below the crowd limit, sorted by load and then by distance. The
//! pick is randomised over the top two so that a burst of simultaneous
//! alerts does not funnel everybody into the single emptiest cell, and the
//! chosen cell is reserved so the next participant sees it as fuller.

use crate::density::{projected_load_excluding, OccupancyMap};
use crate::grid::{CellId, GeoPoint};
use crate::reservation::ReservationLedger;
use crowdflow_env::ParticipantId;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

// ============================================================================
// TIE-BREAK STRATEGIES
// ============================================================================

/// Chooses one of the `n` best candidates.
pub trait TieBreak: Send {
    /// Returns an index in `0..n`. Never called with `n == 0`.
    fn choose(&mut self, n: usize) -> usize;
}

/// Uniform random pick from a seeded ChaCha8 stream.
pub struct SeededTieBreak {
    rng: ChaCha8Rng,
}

impl SeededTieBreak {
    pub fn new(rng: ChaCha8Rng) -> Self {
        Self { rng }
    }

    pub fn from_seed(seed: u64) -> Self {
        Self::new(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl TieBreak for SeededTieBreak {
    fn choose(&mut self, n: usize) -> usize {
        if n <= 1 {
            0
        } else {
            self.rng.gen_range(0..n)
        }
    }
}

/// Always the best candidate (random tie-break disabled).
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstChoice;

impl TieBreak for FirstChoice {
    fn choose(&mut self, _n: usize) -> usize {
        0
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Configuration for the RecommendationEngine
#[derive(Debug, Clone)]
pub struct RecommenderConfig {
    /// Half-width k of the (2k+1) x (2k+1) search window (default: 5)
    pub radius: u32,

    /// How many of the best candidates the tie-break picks from (default: 2)
    pub spread: usize,

    /// Keep recommending a still-valid reservation instead of reselecting
    /// on every poll (default: true)
    pub sticky: bool,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            radius: 5,
            spread: 2,
            sticky: true,
        }
    }
}

/// A cell that passed the load filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub cell: CellId,
    pub projected_load: usize,
    pub distance_sq: i64,
}

/// The cell a participant is pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub cell: CellId,
    pub center: GeoPoint,
    /// Projected load at selection time, excluding this participant's claim
    pub projected_load: usize,
    /// True when an existing reservation was re-validated rather than reselected
    pub sticky: bool,
}

/// Picks a nearby under-limit cell and reserves it.
#[derive(Debug, Clone, Default)]
pub struct RecommendationEngine {
    config: RecommenderConfig,
}

impl RecommendationEngine {
    pub fn new(config: RecommenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    /// All cells in the window, other than `origin`, whose projected load is
    /// strictly below `crowd_limit`, best first.
    ///
    /// Ordering: projected load, then squared grid distance, then cell id so
    /// the result does not depend on hash order.
    #[allow(clippy::too_many_arguments)]
    pub fn candidates(
        &self,
        participant_id: &ParticipantId,
        origin: CellId,
        occupancy: &OccupancyMap,
        ledger: &ReservationLedger,
        crowd_limit: usize,
        now: Duration,
        reservation_ttl: Duration,
    ) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = origin
            .window(self.config.radius)
            .filter(|cell| *cell != origin)
            .filter_map(|cell| {
                let load = projected_load_excluding(cell, occupancy, ledger, now, reservation_ttl, participant_id);
                (load < crowd_limit).then(|| Candidate {
                    cell,
                    projected_load: load,
                    distance_sq: cell.grid_distance_sq(&origin),
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.projected_load
                .cmp(&b.projected_load)
                .then_with(|| a.distance_sq.cmp(&b.distance_sq))
                .then_with(|| a.cell.cmp(&b.cell))
        });

        candidates
    }

    /// Recommend a cell for `participant_id` and record the reservation.
    ///
    /// The caller must hold the ledger exclusively for the whole call: the
    /// sticky check, the choice and the write form one critical section.
    /// Returns `None` (and drops any earlier claim) when no cell in the
    /// window is under the limit.
    #[allow(clippy::too_many_arguments)]
    pub fn recommend(
        &self,
        participant_id: &ParticipantId,
        origin: CellId,
        occupancy: &OccupancyMap,
        ledger: &mut ReservationLedger,
        crowd_limit: usize,
        now: Duration,
        reservation_ttl: Duration,
        tie_break: &mut dyn TieBreak,
    ) -> Option<Recommendation> {
        if self.config.sticky {
            if let Some(existing) = ledger.get_live(participant_id, now, reservation_ttl) {
                let cell = existing.cell;
                let load = projected_load_excluding(cell, occupancy, ledger, now, reservation_ttl, participant_id);

                let k = self.config.radius as i64;
                let in_window = (cell.row - origin.row).abs() <= k && (cell.col - origin.col).abs() <= k;

                if cell != origin && in_window && load < crowd_limit {
                    ledger.reserve(participant_id, cell, now);
                    debug!("Kept sticky recommendation {} for {} (load {})", cell, participant_id, load);
                    return Some(Recommendation {
                        cell,
                        center: cell.center(),
                        projected_load: load,
                        sticky: true,
                    });
                }
            }
        }

        let candidates = self.candidates(participant_id, origin, occupancy, ledger, crowd_limit, now, reservation_ttl);

        if candidates.is_empty() {
            ledger.release(participant_id);
            debug!("No cell under limit {} around {} for {}", crowd_limit, origin, participant_id);
            return None;
        }

        let top = candidates.len().min(self.config.spread.max(1));
        let pick = candidates[tie_break.choose(top).min(top - 1)];

        ledger.reserve(participant_id, pick.cell, now);
        debug!(
            "Recommended {} for {} (load {}, {} candidates)",
            pick.cell,
            participant_id,
            pick.projected_load,
            candidates.len()
        );

        Some(Recommendation {
            cell: pick.cell,
            center: pick.cell.center(),
            projected_load: pick.projected_load,
            sticky: false,
        })
    }
}
