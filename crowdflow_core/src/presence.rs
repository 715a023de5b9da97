//! The Presence Store - who is where, and since when.
//!
//! One record per participant, refreshed on every location update. Records
//! are evicted lazily: there is no sweeper task, `snapshot_live` drops any
//! record whose last update is older than the TTL while it scans. A read is
//! therefore O(n) in the number of stored participants.

use crate::grid::{cell_of, CellId, GeoPoint};
use crowdflow_env::ParticipantId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Inactivity threshold for interactive polling.
pub const INTERACTIVE_PRESENCE_TTL: Duration = Duration::from_secs(45);

/// Inactivity threshold for the simplified simulation mode.
pub const SIMULATION_PRESENCE_TTL: Duration = Duration::from_secs(30);

/// Last known state of a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub participant_id: ParticipantId,
    pub lat: f64,
    pub lng: f64,

    /// Context time of the most recent update
    pub last_update: Duration,

    /// Context time the participant arrived in `cell`.
    /// Reset whenever the resolved cell changes.
    pub join_time: Duration,

    /// Cached `cell_of(lat, lng)`
    pub cell: CellId,
}

impl PresenceRecord {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }

    /// True while `now - last_update <= ttl`.
    #[inline]
    pub fn is_live(&self, now: Duration, ttl: Duration) -> bool {
        now.saturating_sub(self.last_update) <= ttl
    }
}

/// What an upsert did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First update from this participant
    Created,
    /// Participant moved into a new cell; join time was reset
    Moved { from: CellId, to: CellId },
    /// Same cell as before; only the position and last update changed
    Refreshed,
}

/// Participant id -> last known location.
#[derive(Debug, Default)]
pub struct PresenceStore {
    records: HashMap<ParticipantId, PresenceRecord>,
}

impl PresenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a participant's location.
    ///
    /// The join time survives updates inside the same cell and is reset to
    /// `now` when the participant crosses into another cell, so they queue
    /// up as a fresh arrival there.
    pub fn upsert(&mut self, participant_id: &ParticipantId, lat: f64, lng: f64, now: Duration) -> UpsertOutcome {
        let cell = cell_of(lat, lng);

        match self.records.get_mut(participant_id) {
            Some(record) => {
                let previous = record.cell;
                record.lat = lat;
                record.lng = lng;
                record.last_update = now;

                if previous != cell {
                    record.cell = cell;
                    record.join_time = now;
                    UpsertOutcome::Moved { from: previous, to: cell }
                } else {
                    UpsertOutcome::Refreshed
                }
            }
            None => {
                self.records.insert(
                    participant_id.clone(),
                    PresenceRecord {
                        participant_id: participant_id.clone(),
                        lat,
                        lng,
                        last_update: now,
                        join_time: now,
                        cell,
                    },
                );
                UpsertOutcome::Created
            }
        }
    }

    /// Evict stale records and return a copy of everything still live.
    pub fn snapshot_live(&mut self, now: Duration, ttl: Duration) -> Vec<PresenceRecord> {
        let before = self.records.len();
        self.records.retain(|_, record| record.is_live(now, ttl));

        let evicted = before - self.records.len();
        if evicted > 0 {
            debug!("Evicted {} stale presence records ({} live)", evicted, self.records.len());
        }

        self.records.values().cloned().collect()
    }

    pub fn get(&self, participant_id: &ParticipantId) -> Option<&PresenceRecord> {
        self.records.get(participant_id)
    }

    pub fn remove(&mut self, participant_id: &ParticipantId) -> Option<PresenceRecord> {
        self.records.remove(participant_id)
    }

    /// Number of stored records, including ones not yet evicted.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
