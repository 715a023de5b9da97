//! Crowd scenarios for deterministic simulation runs.

use serde::{Serialize, Serializer};

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// SIM-001: Participants stream through one gate cell, one per tick
    GateRush,

    /// SIM-002: A packed cell alerts everybody in the same instant
    Herding,

    /// SIM-003: Alerted participants walk to their recommendation
    Dispersal,

    /// SIM-004: Phones go silent and must age out of the snapshot
    StaleSweep,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::GateRush,
            ScenarioId::Herding,
            ScenarioId::Dispersal,
            ScenarioId::StaleSweep,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::GateRush => "gate_rush",
            ScenarioId::Herding => "herding",
            ScenarioId::Dispersal => "dispersal",
            ScenarioId::StaleSweep => "stale_sweep",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::GateRush => "Arrivals pile into the gate cell; late arrivals get safe recommendations",
            ScenarioId::Herding => "Simultaneous alerts in one cell are spread over several target cells",
            ScenarioId::Dispersal => "Alerted participants follow their routes and the peak occupancy falls",
            ScenarioId::StaleSweep => "Silent phones are evicted once the presence TTL has passed",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Serialize for ScenarioId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gate_rush" | "gaterush" | "sim-001" => Ok(ScenarioId::GateRush),
            "herding" | "sim-002" => Ok(ScenarioId::Herding),
            "dispersal" | "sim-003" => Ok(ScenarioId::Dispersal),
            "stale_sweep" | "stalesweep" | "sim-004" => Ok(ScenarioId::StaleSweep),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
