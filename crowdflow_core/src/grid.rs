//! The Grid Indexer - fixed-step latitude/longitude cells.
//!
//! A venue is small enough that a plain equirectangular grid is good enough:
//! a cell is `LAT_STEP` degrees tall and `LNG_STEP` degrees wide (about 50m
//! on each side at the reference deployment). Every store in the crate is
//! keyed by `CellId`, so changing the steps invalidates any stored cell.

use geo::{HaversineDistance, Point};
use serde::{Deserialize, Serialize};

/// Latitude extent of one cell in degrees (~50m).
pub const LAT_STEP: f64 = 0.00045;

/// Longitude extent of one cell in degrees (~50m at the reference venue).
pub const LNG_STEP: f64 = 0.00045;

/// Step costs for the eight grid neighbours: (d_row, d_col, step distance).
const NEIGHBORS_8: [(i64, i64, f64); 8] = [
    (1, 0, 1.0),
    (-1, 0, 1.0),
    (0, 1, 1.0),
    (0, -1, 1.0),
    (1, 1, std::f64::consts::SQRT_2),
    (-1, 1, std::f64::consts::SQRT_2),
    (1, -1, std::f64::consts::SQRT_2),
    (-1, -1, std::f64::consts::SQRT_2),
];

// ============================================================================
// GEO POINT
// ============================================================================

/// A WGS84 coordinate as reported by a participant's phone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// True for finite coordinates inside the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// The cell containing this point.
    pub fn cell(&self) -> CellId {
        cell_of(self.lat, self.lng)
    }

    /// Great-circle distance in meters.
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        Point::new(self.lng, self.lat).haversine_distance(&Point::new(other.lng, other.lat))
    }
}

// ============================================================================
// CELL ID
// ============================================================================

/// Discrete grid cell: `(floor(lat / LAT_STEP), floor(lng / LNG_STEP))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId {
    pub row: i64,
    pub col: i64,
}

impl CellId {
    pub const fn new(row: i64, col: i64) -> Self {
        Self { row, col }
    }

    /// Geographic footprint of this cell.
    pub fn bounds(&self) -> CellBounds {
        cell_bounds(*self)
    }

    /// Center coordinate of this cell.
    pub fn center(&self) -> GeoPoint {
        self.bounds().center()
    }

    /// Offset this cell by whole rows/columns.
    #[inline]
    pub fn offset(&self, d_row: i64, d_col: i64) -> CellId {
        CellId::new(self.row + d_row, self.col + d_col)
    }

    /// All cells in the `(2k+1) x (2k+1)` window centred here, row-major,
    /// including this cell.
    pub fn window(&self, k: u32) -> impl Iterator<Item = CellId> {
        let k = k as i64;
        let center = *self;
        (-k..=k).flat_map(move |dr| (-k..=k).map(move |dc| center.offset(dr, dc)))
    }

    /// The 8-connected neighbours with their step distance
    /// (1 orthogonal, sqrt(2) diagonal).
    pub fn neighbors8(&self) -> impl Iterator<Item = (CellId, f64)> {
        let center = *self;
        NEIGHBORS_8
            .iter()
            .map(move |&(dr, dc, step)| (center.offset(dr, dc), step))
    }

    /// Squared Euclidean distance in row/column units.
    ///
    /// Integer-valued, so it is safe to use as a sort key.
    pub fn grid_distance_sq(&self, other: &CellId) -> i64 {
        let dr = self.row - other.row;
        let dc = self.col - other.col;
        dr * dr + dc * dc
    }

    /// Euclidean distance in row/column units.
    pub fn grid_distance(&self, other: &CellId) -> f64 {
        (self.grid_distance_sq(other) as f64).sqrt()
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.row, self.col)
    }
}

/// Bounding box of a cell in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellBounds {
    pub lat_min: f64,
    pub lng_min: f64,
    pub lat_max: f64,
    pub lng_max: f64,
}

impl CellBounds {
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.lat_min + self.lat_max) / 2.0,
            (self.lng_min + self.lng_max) / 2.0,
        )
    }

    /// Half-open containment test `[min, max)` on both axes.
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.lat >= self.lat_min
            && point.lat < self.lat_max
            && point.lng >= self.lng_min
            && point.lng < self.lng_max
    }
}

// ============================================================================
// INDEXER
// ============================================================================

/// Map a coordinate to its cell. Pure and total.
///
/// Non-finite input saturates rather than panicking; callers validate
/// coordinates before they reach the stores.
pub fn cell_of(lat: f64, lng: f64) -> CellId {
    CellId::new(
        (lat / LAT_STEP).floor() as i64,
        (lng / LNG_STEP).floor() as i64,
    )
}

/// Inverse of [`cell_of`]: the footprint of a cell.
pub fn cell_bounds(cell: CellId) -> CellBounds {
    CellBounds {
        lat_min: cell.row as f64 * LAT_STEP,
        lng_min: cell.col as f64 * LNG_STEP,
        lat_max: (cell.row + 1) as f64 * LAT_STEP,
        lng_max: (cell.col + 1) as f64 * LNG_STEP,
    }
}
