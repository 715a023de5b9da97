//! CrowdFlow Deterministic Simulation Harness
//!
//! This crate drives a real `CrowdService` with a simulated crowd so that
//! alerting, anti-herding and routing can be checked end to end.
//!
//! # Core Principle
//!
//! All sources of non-determinism are controlled:
//! - **Time**: a virtual clock that only moves when the runner ticks it
//! - **Randomness**: walker spawns, GPS noise and the tie-break all derive
//!   from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                       SimWorld                        │
//! │  ┌─────────────┐   fixes / polls   ┌──────────────┐   │
//! │  │ CrowdOracle │ ────────────────► │ CrowdService │   │
//! │  │ (walkers)   │ ◄──────────────── │ (core)       │   │
//! │  └─────────────┘  recommendations  └──────────────┘   │
//! │         ▲                                 ▲           │
//! │         └──────────── SimContext ─────────┘           │
//! │                 (virtual clock, seed)                 │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use crowdflow_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42, 30).run(ScenarioId::Herding).await;
//! assert!(result.passed);
//! ```

mod context;
mod crowd;
mod error;
mod runner;
mod world;
pub mod scenarios;

pub use context::SimContext;
pub use crowd::{CrowdOracle, Walker, METERS_PER_DEGREE};
pub use error::SimError;
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use world::{SimConfig, SimWorld, VENUE_GATE};
