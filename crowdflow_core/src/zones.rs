//! Static venue zone table (polygon containment).

use crate::error::RequestError;
use crate::grid::GeoPoint;
use crowdflow_env::{CollaboratorError, ZoneId, ZoneLookup};
use geo::{Contains, LineString, Point, Polygon};

/// A named zone of the venue (stand, concourse, gate plaza, ...).
#[derive(Debug, Clone)]
pub struct Zone {
    pub id: ZoneId,
    pub polygon: Polygon<f64>,
}

/// In-memory zone table. The first zone containing a point wins, so
/// overlapping zones should be added most specific first.
#[derive(Debug, Clone, Default)]
pub struct PolygonZoneTable {
    zones: Vec<Zone>,
}

impl PolygonZoneTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a zone from its outline. The ring is closed automatically.
    pub fn add_zone(&mut self, id: impl Into<ZoneId>, outline: &[GeoPoint]) -> Result<(), RequestError> {
        let id = id.into();
        if outline.len() < 3 {
            return Err(RequestError::InvalidZone(format!(
                "zone {} needs at least 3 vertices, got {}",
                id,
                outline.len()
            )));
        }
        if let Some(bad) = outline.iter().find(|p| !p.is_valid()) {
            return Err(RequestError::InvalidZone(format!("zone {} has invalid vertex {:?}", id, bad)));
        }

        // geo works in (x, y) = (lng, lat)
        let ring: LineString<f64> = outline.iter().map(|p| (p.lng, p.lat)).collect::<Vec<_>>().into();
        self.zones.push(Zone {
            id,
            polygon: Polygon::new(ring, vec![]),
        });
        Ok(())
    }

    /// Builder-style [`add_zone`](Self::add_zone).
    pub fn with_zone(mut self, id: impl Into<ZoneId>, outline: &[GeoPoint]) -> Result<Self, RequestError> {
        self.add_zone(id, outline)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

impl ZoneLookup for PolygonZoneTable {
    fn zone_of(&self, lat: f64, lng: f64) -> Result<Option<ZoneId>, CollaboratorError> {
        let point = Point::new(lng, lat);
        Ok(self
            .zones
            .iter()
            .find(|zone| zone.polygon.contains(&point))
            .map(|zone| zone.id.clone()))
    }
}
