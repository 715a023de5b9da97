//! CrowdFlow Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction allowing the CrowdFlow core
//! to run in both **Production** (tokio) and **Simulation** (virtual clock)
//! environments.
//!
//! # Core Concept
//!
//! The crowd core is pure in-memory computation, but it depends on three
//! things it must not own:
//! - Time (`now()`, `sleep()`) for TTLs and arrival windows
//! - Randomness (`derive_rng()`) for the anti-herding tie-break
//! - Collaborators (zone table, density classifier)
//!
//! By deriving all entropy from a single 64-bit seed and all time from the
//! context clock, any crowd scenario becomes reproducible via its seed.
//!
//! # Example
//!
//! ```ignore
//! use crowdflow_env::{CrowdContext, TokioContext};
//!
//! let ctx = TokioContext::shared();
//! let now = ctx.now();
//! let mut rng = ctx.derive_rng(1);
//! ```

mod collaborators;
mod context;
mod error;
mod tokio_impl;
mod types;

pub use collaborators::{DensityClassifier, NoZones, ZoneLookup};
pub use context::CrowdContext;
pub use error::CollaboratorError;
pub use tokio_impl::TokioContext;
pub use types::{DensityLevel, ParticipantId, ZoneId};
