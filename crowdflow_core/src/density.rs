//! The Density Aggregator - occupancy and projected load per cell.
//!
//! The occupancy map is a derived view: it is rebuilt from a presence
//! snapshot on every request and never edited in place.

use crate::grid::{CellId, GeoPoint};
use crate::presence::PresenceRecord;
use crate::reservation::ReservationLedger;
use crowdflow_env::ParticipantId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Cell -> number of live participants resolving to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccupancyMap {
    counts: HashMap<CellId, usize>,
}

/// One entry of the occupancy snapshot returned to a requester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellOccupancy {
    pub cell: CellId,
    pub count: usize,
    pub center: GeoPoint,
}

impl OccupancyMap {
    /// One pass over the live records, +1 per record's cached cell.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a PresenceRecord>) -> Self {
        let mut counts: HashMap<CellId, usize> = HashMap::new();
        for record in records {
            *counts.entry(record.cell).or_insert(0) += 1;
        }
        Self { counts }
    }

    /// Build a map from explicit counts (synthetic layouts, replays).
    pub fn from_counts(counts: impl IntoIterator<Item = (CellId, usize)>) -> Self {
        Self {
            counts: counts.into_iter().filter(|(_, n)| *n > 0).collect(),
        }
    }

    /// Occupancy of a cell; 0 for cells nobody is in.
    #[inline]
    pub fn get(&self, cell: CellId) -> usize {
        self.counts.get(&cell).copied().unwrap_or(0)
    }

    /// Total participants across all cells.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Number of occupied cells.
    pub fn occupied_cells(&self) -> usize {
        self.counts.len()
    }

    /// The fullest cell, ties broken by the smallest cell id.
    pub fn peak(&self) -> Option<(CellId, usize)> {
        self.counts
            .iter()
            .map(|(cell, n)| (*cell, *n))
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (CellId, usize)> + '_ {
        self.counts.iter().map(|(cell, n)| (*cell, *n))
    }

    /// Occupancy of every cell in the `(2k+1) x (2k+1)` window around
    /// `center`, empty cells included, row-major.
    pub fn window(&self, center: CellId, k: u32) -> Vec<CellOccupancy> {
        center
            .window(k)
            .map(|cell| CellOccupancy {
                cell,
                count: self.get(cell),
                center: cell.center(),
            })
            .collect()
    }
}

/// Build the occupancy map for a presence snapshot.
pub fn occupancy(live_records: &[PresenceRecord]) -> OccupancyMap {
    OccupancyMap::from_records(live_records)
}

/// Occupancy plus the live reservations pointing at `cell`.
///
/// Reservations older than `reservation_ttl` are ignored here; they are
/// pruned separately.
pub fn projected_load(
    cell: CellId,
    occupancy: &OccupancyMap,
    ledger: &ReservationLedger,
    now: Duration,
    reservation_ttl: Duration,
) -> usize {
    occupancy.get(cell) + ledger.live_count(cell, now, reservation_ttl, None)
}

/// Projected load as seen by one participant: their own reservation is not
/// counted against the cell.
pub fn projected_load_excluding(
    cell: CellId,
    occupancy: &OccupancyMap,
    ledger: &ReservationLedger,
    now: Duration,
    reservation_ttl: Duration,
    participant_id: &ParticipantId,
) -> usize {
    occupancy.get(cell) + ledger.live_count(cell, now, reservation_ttl, Some(participant_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::PresenceStore;
    use crate::reservation::RESERVATION_TTL;
    use crate::grid::{LAT_STEP, LNG_STEP};

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_occupancy_counts_per_cell() {
        let mut store = PresenceStore::new();
        let (lat, lng) = (10.5 * LAT_STEP, 10.5 * LNG_STEP);
        store.upsert(&ParticipantId::new("a"), lat, lng, secs(0));
        store.upsert(&ParticipantId::new("b"), lat, lng, secs(0));
        store.upsert(&ParticipantId::new("c"), lat + LAT_STEP, lng, secs(0));

        let live = store.snapshot_live(secs(1), secs(45));
        let map = occupancy(&live);

        assert_eq!(map.get(CellId::new(10, 10)), 2);
        assert_eq!(map.get(CellId::new(11, 10)), 1);
        assert_eq!(map.get(CellId::new(0, 0)), 0);
        assert_eq!(map.total(), 3);
        assert_eq!(map.peak(), Some((CellId::new(10, 10), 2)));
    }

    #[test]
    fn test_projected_load_adds_live_reservations_only() {
        let cell = CellId::new(3, 3);
        let map = OccupancyMap::from_counts([(cell, 2)]);
        let mut ledger = ReservationLedger::new();
        ledger.reserve(&ParticipantId::new("fresh"), cell, secs(100));
        ledger.reserve(&ParticipantId::new("stale"), cell, secs(50));

        assert_eq!(projected_load(cell, &map, &ledger, secs(101), RESERVATION_TTL), 3);
        assert_eq!(
            projected_load_excluding(cell, &map, &ledger, secs(101), RESERVATION_TTL, &ParticipantId::new("fresh")),
            2
        );
    }

    #[test]
    fn test_window_includes_empty_cells() {
        let map = OccupancyMap::from_counts([(CellId::new(0, 1), 4)]);
        let window = map.window(CellId::new(0, 0), 1);

        assert_eq!(window.len(), 9);
        let hot = window.iter().find(|c| c.cell == CellId::new(0, 1)).unwrap();
        assert_eq!(hot.count, 4);
        assert_eq!(window.iter().map(|c| c.count).sum::<usize>(), 4);
    }
}
