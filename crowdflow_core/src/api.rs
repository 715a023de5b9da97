//! Request and response types for the crowd service.
//!
//! These are the wire shapes the front end exchanges with the service; they
//! derive serde so any transport can carry them as JSON.

use crate::density::CellOccupancy;
use crate::error::RequestError;
use crate::grid::{CellId, GeoPoint};
use crate::pathfind::SafePath;
use crate::recommend::Recommendation;
use crowdflow_env::{ParticipantId, ZoneId};
use serde::{Deserialize, Serialize};

// ============================================================================
// LOCATION INGESTION
// ============================================================================

/// A participant's position fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdate {
    pub participant_id: ParticipantId,
    pub lat: f64,
    pub lng: f64,
}

/// Acknowledgment of a location update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationAck {
    pub participant_id: ParticipantId,
    pub cell: CellId,

    /// Zone containing the fix, if the zone table knows one
    pub zone: Option<ZoneId>,

    /// Set when the zone lookup failed; the update itself was still stored
    pub zone_error: Option<String>,
}

// ============================================================================
// STATUS QUERY
// ============================================================================

/// "Where am I and what should I do?" poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusQuery {
    pub participant_id: ParticipantId,
    pub lat: f64,
    pub lng: f64,

    /// Explicit destination chosen by the participant
    #[serde(default)]
    pub target: Option<GeoPoint>,

    /// Ask for a recommendation even without an alert
    #[serde(default)]
    pub auto_route: bool,
}

/// Another participant within the nearby radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyParticipant {
    pub participant_id: ParticipantId,
    pub lat: f64,
    pub lng: f64,
    pub distance_m: f64,
}

/// Everything the front end renders after a poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub participant_id: ParticipantId,
    pub cell: CellId,
    pub occupancy: usize,
    pub rank: usize,
    pub is_crowded: bool,
    pub should_alert: bool,
    pub crowd_limit: usize,

    /// Other live participants within the nearby radius, closest first
    pub nearby: Vec<NearbyParticipant>,

    /// Occupancy of the cells around the requester
    pub occupancy_window: Vec<CellOccupancy>,

    pub recommendation: Option<Recommendation>,
    pub path: Option<SafePath>,
}

// ============================================================================
// SECTOR REPORTS & ADMIN
// ============================================================================

/// Density report for a named section (manual or classifier-confirmed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorReportRequest {
    pub section_id: String,
    /// 1 = low, 2 = medium, 3 = high
    pub level: u8,
}

/// Store sizes for logs and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStats {
    pub live_participants: usize,
    pub occupied_cells: usize,
    pub reservations: usize,
    pub sector_reports: usize,
    pub crowd_limit: usize,
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Check a participant id and coordinate pair before anything is stored.
pub(crate) fn validate_fix(participant_id: &ParticipantId, lat: f64, lng: f64) -> Result<GeoPoint, RequestError> {
    if participant_id.is_blank() {
        return Err(RequestError::MissingParticipantId);
    }
    validate_point(GeoPoint::new(lat, lng))
}

pub(crate) fn validate_point(point: GeoPoint) -> Result<GeoPoint, RequestError> {
    if point.is_valid() {
        Ok(point)
    } else {
        Err(RequestError::InvalidCoordinates(format!("({}, {})", point.lat, point.lng)))
    }
}
