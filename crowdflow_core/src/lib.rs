//! CrowdFlow Core - crowd density, anti-herding redistribution and safest paths
//!
//! This library answers three questions for every participant at a venue:
//! 1. **Am I in a crowd?** Positions are snapped to a ~50 m grid, counted per
//!    cell, and each participant is ranked by arrival within their cell.
//! 2. **Where should I go instead?** Late arrivals in an over-limit cell get
//!    a nearby under-limit cell, reserved for a short time so a burst of
//!    alerts does not send everyone to the same place.
//! 3. **How do I get there?** A* over the grid with crowd-weighted step
//!    costs, falling back to a straight line if the search runs too long.
//!
//! All state lives in a [`CrowdService`]; time and randomness come from a
//! [`crowdflow_env::CrowdContext`] so scenarios replay exactly from a seed.

pub mod api;
pub mod config;
pub mod density;
pub mod error;
pub mod grid;
pub mod pathfind;
pub mod presence;
pub mod rank;
pub mod recommend;
pub mod reservation;
pub mod sectors;
pub mod service;
pub mod zones;

// Re-export key types for convenience
pub use api::{
    LocationAck, LocationUpdate, NearbyParticipant, SectorReportRequest, ServiceStats, StatusQuery, StatusReport,
};
pub use config::CrowdConfig;
pub use density::{CellOccupancy, OccupancyMap};
pub use error::RequestError;
pub use grid::{cell_of, CellId, GeoPoint};
pub use pathfind::{PathOutcome, SafePath, SafestPathFinder};
pub use presence::{PresenceRecord, PresenceStore};
pub use rank::CrowdAssessment;
pub use recommend::{FirstChoice, Recommendation, RecommendationEngine, RecommenderConfig, SeededTieBreak, TieBreak};
pub use reservation::{Reservation, ReservationLedger};
pub use sectors::{ReportSource, SectorReport};
pub use service::CrowdService;
pub use zones::PolygonZoneTable;
