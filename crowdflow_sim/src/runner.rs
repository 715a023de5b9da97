//! Scenario runner - executes crowd scenarios against a live CrowdService.

use crate::error::SimError;
use crate::scenarios::ScenarioId;
use crate::world::{SimConfig, SimWorld};

use crowdflow_core::{CellId, PathOutcome, StatusReport};
use crowdflow_env::ParticipantId;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

/// Seconds into the stale sweep at which half the phones go quiet.
const SILENCE_AT_SECS: u64 = 5;

/// Idle drift used by the stale sweep, m/s per axis.
const SWEEP_WANDER_MPS: f64 = 0.3;

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total ticks executed
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Live participants in the service at the end
    pub final_participant_count: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScenarioMetrics {
    /// Status polls sent to the service
    pub polls: u64,

    /// Polls that came back with an alert
    pub alerts: u64,

    /// Polls that came back with a recommendation (sticky repeats included)
    pub recommendations: u64,

    /// Different cells participants were sent to
    pub distinct_recommended_cells: usize,

    /// Routes that hit the A* expansion cap
    pub fallback_paths: u64,

    /// Highest cell occupancy seen in the service's snapshot
    pub peak_occupancy: usize,

    /// Highest cell occupancy at the end of the run
    pub final_peak_occupancy: usize,

    /// Recommendations whose cell was over the limit once the claim was counted
    pub unsafe_recommendations: u64,

    /// Presence records dropped by the TTL sweep
    pub evicted: usize,
}

/// Running totals for one scenario.
#[derive(Default)]
struct Tally {
    metrics: ScenarioMetrics,
    recommended: BTreeSet<CellId>,
}

impl Tally {
    fn observe(&mut self, world: &SimWorld, report: &StatusReport) {
        self.metrics.polls += 1;
        if report.should_alert {
            self.metrics.alerts += 1;
        }

        if let Some(rec) = &report.recommendation {
            self.metrics.recommendations += 1;
            self.recommended.insert(rec.cell);

            let occupancy = world.service.occupancy_snapshot().get(rec.cell);
            let claims = world.service.reservations().iter().filter(|r| r.cell == rec.cell).count();
            if occupancy + claims > report.crowd_limit {
                warn!(
                    "Unsafe recommendation {} for {}: occupancy {} + claims {} > limit {}",
                    rec.cell, report.participant_id, occupancy, claims, report.crowd_limit
                );
                self.metrics.unsafe_recommendations += 1;
            }
        }

        if report.path.as_ref().map_or(false, |p| p.outcome == PathOutcome::Fallback) {
            self.metrics.fallback_paths += 1;
        }
    }

    fn sample_peak(&mut self, world: &SimWorld) -> usize {
        let peak = current_peak(world);
        self.metrics.peak_occupancy = self.metrics.peak_occupancy.max(peak);
        peak
    }

    fn finish(mut self, world: &SimWorld) -> ScenarioMetrics {
        self.metrics.distinct_recommended_cells = self.recommended.len();
        self.metrics.final_peak_occupancy = current_peak(world);
        self.metrics
    }
}

fn current_peak(world: &SimWorld) -> usize {
    world.service.occupancy_snapshot().peak().map_or(0, |(_, n)| n)
}

/// What a scenario body reports back to the runner.
struct Verdict {
    metrics: ScenarioMetrics,
    failure: Option<String>,
}

/// Runs crowd scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Number of participants
    participants: usize,

    /// Crowd limit per cell
    crowd_limit: usize,

    /// Maximum duration in seconds
    max_duration_secs: f64,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, participants: usize) -> Self {
        Self {
            seed,
            participants,
            crowd_limit: 5,
            max_duration_secs: 60.0,
        }
    }

    /// Sets the crowd limit.
    pub fn with_crowd_limit(mut self, limit: usize) -> Self {
        self.crowd_limit = limit;
        self
    }

    /// Sets the maximum duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    fn config(&self) -> SimConfig {
        // One-second ticks: the stale sweep counts TTL seconds in ticks
        SimConfig {
            seed: self.seed,
            crowd_limit: self.crowd_limit,
            tick_secs: 1.0,
            max_duration_secs: self.max_duration_secs,
            ..SimConfig::default()
        }
    }

    /// Runs a scenario and returns the result.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let mut world = match SimWorld::new(self.config()) {
            Ok(world) => world,
            Err(e) => {
                error!("Scenario {} could not start: {}", scenario, e);
                return ScenarioResult {
                    scenario,
                    seed: self.seed,
                    passed: false,
                    total_ticks: 0,
                    final_time_secs: 0.0,
                    final_participant_count: 0,
                    failure_reason: Some(e.to_string()),
                    metrics: ScenarioMetrics::default(),
                };
            }
        };

        let verdict = match scenario {
            ScenarioId::GateRush => self.run_gate_rush(&mut world).await,
            ScenarioId::Herding => self.run_herding(&mut world).await,
            ScenarioId::Dispersal => self.run_dispersal(&mut world).await,
            ScenarioId::StaleSweep => self.run_stale_sweep(&mut world).await,
        };

        let (metrics, failure_reason) = match verdict {
            Ok(Verdict { metrics, failure }) => (metrics, failure),
            Err(e) => {
                error!("Scenario {} aborted: {}", scenario, e);
                (ScenarioMetrics::default(), Some(e.to_string()))
            }
        };

        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: failure_reason.is_none(),
            total_ticks: world.tick_count(),
            final_time_secs: world.time(),
            final_participant_count: world.service.stats().live_participants,
            failure_reason,
            metrics,
        }
    }

    /// SIM-001: GateRush - one arrival per tick into the gate cell.
    ///
    /// Every newcomer polls as soon as it arrives. Once the cell holds more
    /// than the crowd limit, each newcomer must be alerted and pointed at a
    /// cell that stays within the limit after its claim is counted.
    async fn run_gate_rush(&self, world: &mut SimWorld) -> Result<Verdict, SimError> {
        info!("SIM-001: GateRush - {} arrivals through one cell", self.participants);

        let gate = world.gate();
        let arrivals = self.participants.min(world.max_ticks().max(1) as usize);
        let mut tally = Tally::default();

        for i in 0..arrivals {
            if i > 0 {
                world.tick().await;
            }
            world.report_all()?;

            let newcomer = world.oracle.spawn_in_cell(gate);
            let report = world.poll(&newcomer)?;
            tally.observe(world, &report);
            tally.sample_peak(world);

            debug!(
                "  t={:.0}s | arrival #{} rank={} alert={} rec={:?}",
                world.time(),
                i + 1,
                report.rank,
                report.should_alert,
                report.recommendation.map(|r| r.cell)
            );
        }

        let expected_alerts = arrivals.saturating_sub(self.crowd_limit) as u64;
        let metrics = tally.finish(world);

        let failure = if metrics.unsafe_recommendations > 0 {
            Some(format!(
                "{} recommendations pushed a cell over the limit",
                metrics.unsafe_recommendations
            ))
        } else if metrics.alerts != expected_alerts {
            Some(format!("expected {} alerts, saw {}", expected_alerts, metrics.alerts))
        } else if metrics.recommendations != metrics.alerts {
            Some(format!(
                "{} of {} alerted participants got no recommendation",
                metrics.alerts - metrics.recommendations.min(metrics.alerts),
                metrics.alerts
            ))
        } else {
            None
        };

        info!(
            "✓ GateRush complete: {} alerts, {} recommendations over {} cells, peak {}",
            metrics.alerts, metrics.recommendations, metrics.distinct_recommended_cells, metrics.peak_occupancy
        );
        Ok(Verdict { metrics, failure })
    }

    /// SIM-002: Herding - everybody in a packed cell polls in the same instant.
    ///
    /// With equally empty neighbours, the reservations and the randomised
    /// tie-break must spread the alerted participants over several cells.
    async fn run_herding(&self, world: &mut SimWorld) -> Result<Verdict, SimError> {
        info!("SIM-002: Herding - {} simultaneous polls", self.participants);

        let ids = self.pack_gate(world);
        world.report_all()?;

        let mut tally = Tally::default();
        tally.sample_peak(world);

        for id in &ids {
            let report = world.poll(id)?;
            tally.observe(world, &report);
        }

        let metrics = tally.finish(world);

        let failure = if metrics.unsafe_recommendations > 0 {
            Some(format!(
                "{} recommendations pushed a cell over the limit",
                metrics.unsafe_recommendations
            ))
        } else if metrics.alerts >= 2 && metrics.distinct_recommended_cells < 2 {
            Some(format!(
                "{} alerted participants were all sent to the same cell",
                metrics.alerts
            ))
        } else if metrics.recommendations != metrics.alerts {
            Some(format!(
                "{} alerts but {} recommendations",
                metrics.alerts, metrics.recommendations
            ))
        } else {
            None
        };

        info!(
            "✓ Herding complete: {} alerts spread over {} cells",
            metrics.alerts, metrics.distinct_recommended_cells
        );
        Ok(Verdict { metrics, failure })
    }

    /// SIM-003: Dispersal - alerted participants walk to their recommendation.
    ///
    /// Everyone polls every tick; a recommendation becomes the walker's
    /// target. By the end the fullest cell must hold fewer people than the
    /// packed gate did at the start.
    async fn run_dispersal(&self, world: &mut SimWorld) -> Result<Verdict, SimError> {
        info!("SIM-003: Dispersal - {} participants leave a packed gate", self.participants);

        let ids = self.pack_gate(world);
        world.report_all()?;

        let mut tally = Tally::default();
        let initial_peak = tally.sample_peak(world);

        for _ in 0..world.max_ticks() {
            for id in &ids {
                let report = world.poll(id)?;
                if let Some(rec) = &report.recommendation {
                    world.oracle.head_to(id, rec.center)?;
                }
                tally.observe(world, &report);
            }

            world.tick().await;
            world.report_all()?;
            let peak = tally.sample_peak(world);

            if world.tick_count() % 10 == 0 {
                debug!("  t={:.0}s | peak occupancy {}", world.time(), peak);
            }
        }

        let metrics = tally.finish(world);

        let failure = if metrics.unsafe_recommendations > 0 {
            Some(format!(
                "{} recommendations pushed a cell over the limit",
                metrics.unsafe_recommendations
            ))
        } else if initial_peak > self.crowd_limit && metrics.recommendations == 0 {
            Some("the packed gate produced no recommendations".to_string())
        } else if initial_peak > self.crowd_limit && metrics.final_peak_occupancy >= initial_peak {
            Some(format!(
                "peak occupancy did not fall ({} -> {})",
                initial_peak, metrics.final_peak_occupancy
            ))
        } else {
            None
        };

        info!(
            "✓ Dispersal complete: peak {} -> {}, {} fallback paths",
            initial_peak, metrics.final_peak_occupancy, metrics.fallback_paths
        );
        Ok(Verdict { metrics, failure })
    }

    /// SIM-004: StaleSweep - half the phones stop reporting.
    ///
    /// Silent participants must stay in the snapshot for exactly the
    /// presence TTL and be gone one tick later. Runs for a fixed timeline
    /// regardless of the configured duration.
    async fn run_stale_sweep(&self, world: &mut SimWorld) -> Result<Verdict, SimError> {
        info!("SIM-004: StaleSweep - {} participants, half go silent", self.participants);

        world.oracle.set_wander(SWEEP_WANDER_MPS)?;
        let around_gate: Vec<CellId> = world.gate().window(1).collect();
        let ids: Vec<ParticipantId> = (0..self.participants)
            .map(|i| world.oracle.spawn_in_cell(around_gate[i % around_gate.len()]))
            .collect();
        let silenced: Vec<ParticipantId> = ids.iter().step_by(2).cloned().collect();

        let ttl_secs = world.service.config().presence_ttl.as_secs();
        let mut tally = Tally::default();
        let mut live_at_ttl = 0;

        world.report_all()?;
        for t in 1..=SILENCE_AT_SECS + ttl_secs + 1 {
            world.tick().await;
            world.report_all()?;

            if t == SILENCE_AT_SECS {
                for id in &silenced {
                    world.oracle.silence(id)?;
                }
                info!("  t={}s | silenced {} phones", t, silenced.len());
            }
            if t == SILENCE_AT_SECS + ttl_secs {
                live_at_ttl = world.service.stats().live_participants;
            }
            tally.sample_peak(world);
        }

        let live_after = world.service.stats().live_participants;
        let lingering = silenced
            .iter()
            .filter(|id| world.service.position_of(id).is_some())
            .count();

        let mut metrics = tally.finish(world);
        metrics.evicted = ids.len().saturating_sub(live_after);

        let failure = if live_at_ttl != ids.len() {
            Some(format!(
                "{} of {} participants were evicted before the TTL elapsed",
                ids.len() - live_at_ttl.min(ids.len()),
                ids.len()
            ))
        } else if live_after != ids.len() - silenced.len() || lingering > 0 {
            Some(format!(
                "expected {} live after the sweep, found {} ({} silent still present)",
                ids.len() - silenced.len(),
                live_after,
                lingering
            ))
        } else {
            None
        };

        info!("✓ StaleSweep complete: {} evicted, {} live", metrics.evicted, live_after);
        Ok(Verdict { metrics, failure })
    }

    /// Spawns every participant inside the gate cell.
    fn pack_gate(&self, world: &mut SimWorld) -> Vec<ParticipantId> {
        let gate = world.gate();
        (0..self.participants).map(|_| world.oracle.spawn_in_cell(gate)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gate_rush_scenario() {
        let result = ScenarioRunner::new(42, 20).run(ScenarioId::GateRush).await;

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.alerts, 15);
        assert_eq!(result.metrics.recommendations, 15);
        assert_eq!(result.metrics.unsafe_recommendations, 0);
        assert_eq!(result.metrics.peak_occupancy, 20);
        assert_eq!(result.total_ticks, 19);
    }

    #[tokio::test]
    async fn test_gate_rush_respects_duration() {
        let result = ScenarioRunner::new(42, 20)
            .with_duration(8.0)
            .run(ScenarioId::GateRush)
            .await;

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.alerts, 3);
    }

    #[tokio::test]
    async fn test_herding_spreads_alerts() {
        let result = ScenarioRunner::new(7, 20).run(ScenarioId::Herding).await;

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.alerts, 15);
        assert!(result.metrics.distinct_recommended_cells >= 3);
    }

    #[tokio::test]
    async fn test_dispersal_lowers_peak() {
        let result = ScenarioRunner::new(42, 20).run(ScenarioId::Dispersal).await;

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.peak_occupancy, 20);
        assert!(result.metrics.final_peak_occupancy < 20);
    }

    #[tokio::test]
    async fn test_stale_sweep_evicts_silent_phones() {
        let result = ScenarioRunner::new(42, 10).run(ScenarioId::StaleSweep).await;

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.evicted, 5);
        assert_eq!(result.final_participant_count, 5);
        assert_eq!(result.total_ticks, 36);
    }

    #[tokio::test]
    async fn test_same_seed_same_metrics() {
        let a = ScenarioRunner::new(99, 20).run(ScenarioId::Herding).await;
        let b = ScenarioRunner::new(99, 20).run(ScenarioId::Herding).await;

        assert_eq!(a.metrics, b.metrics);
    }
}
