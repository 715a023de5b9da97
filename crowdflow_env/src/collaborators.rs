//! Contracts for the external services the CrowdFlow core consumes.

use async_trait::async_trait;
use crate::error::CollaboratorError;
use crate::types::{DensityLevel, ZoneId};

/// Polygon-containment lookup against the venue's static zone table.
///
/// Called on every location ingestion. `Ok(None)` means the point lies
/// outside every known zone, which is not an error.
pub trait ZoneLookup: Send + Sync {
    /// Returns the zone containing `(lat, lng)`, if any.
    fn zone_of(&self, lat: f64, lng: f64) -> Result<Option<ZoneId>, CollaboratorError>;
}

/// The external image-based crowd density classifier.
///
/// # Flow
///
/// ```text
/// Steward app                 CrowdFlow                  Vision service
///   |                           |                          |
///   |-- classify(section,img) ->|                          |
///   |                           |-- classify(img) -------->|
///   |                           |<------- DensityLevel ----|
///   |<------- stored report ----|                          |
/// ```
#[async_trait]
pub trait DensityClassifier: Send + Sync + 'static {
    /// Classifies a still image of a section into one of three labels.
    ///
    /// # Returns
    /// * `Ok(level)` - The classifier's label
    /// * `Err(CollaboratorError)` - The service failed; nothing is stored
    async fn classify(&self, image: &[u8]) -> Result<DensityLevel, CollaboratorError>;
}

/// Zone lookup for venues without a zone table.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoZones;

impl ZoneLookup for NoZones {
    fn zone_of(&self, _lat: f64, _lng: f64) -> Result<Option<ZoneId>, CollaboratorError> {
        Ok(None)
    }
}
