//! Rank & Alert Decision.
//!
//! Participants in a cell form an arrival queue ordered by join time. Only
//! the ones queued beyond the crowd limit who also just arrived get an
//! interruptive alert; everybody in an over-limit cell gets the passive
//! "crowded" flag. Long-resident participants are not re-alerted on every
//! poll.

use crate::density::OccupancyMap;
use crate::grid::CellId;
use crate::presence::PresenceRecord;
use crowdflow_env::ParticipantId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long after joining a cell a participant counts as a new arrival.
pub const NEW_ARRIVAL_WINDOW: Duration = Duration::from_secs(20);

/// Outcome of the rank & alert decision for one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrowdAssessment {
    pub cell: CellId,
    pub occupancy: usize,
    /// 1-based position in the cell's arrival queue
    pub rank: usize,
    pub is_crowded: bool,
    pub is_new_arrival: bool,
    pub should_alert: bool,
}

/// 1-based position of `participant_id` among the live records in `cell`,
/// ordered by ascending join time (ties by participant id).
///
/// Falls back to 1 when the participant is not in the snapshot.
pub fn rank_in_cell(participant_id: &ParticipantId, cell: CellId, live_records: &[PresenceRecord]) -> usize {
    let mut queue: Vec<&PresenceRecord> = live_records.iter().filter(|r| r.cell == cell).collect();
    queue.sort_by(|a, b| {
        a.join_time
            .cmp(&b.join_time)
            .then_with(|| a.participant_id.cmp(&b.participant_id))
    });

    queue
        .iter()
        .position(|r| &r.participant_id == participant_id)
        .map(|idx| idx + 1)
        .unwrap_or(1)
}

/// Decide whether a participant's cell is crowded and whether to alert them.
///
/// A participant missing from the snapshot is treated as having just
/// arrived; with the rank fallback of 1 they are only alerted when the
/// crowd limit is 0.
pub fn assess(
    participant_id: &ParticipantId,
    cell: CellId,
    live_records: &[PresenceRecord],
    occupancy: &OccupancyMap,
    crowd_limit: usize,
    now: Duration,
    new_arrival_window: Duration,
) -> CrowdAssessment {
    let cell_occupancy = occupancy.get(cell);
    let rank = rank_in_cell(participant_id, cell, live_records);

    let is_new_arrival = live_records
        .iter()
        .find(|r| &r.participant_id == participant_id)
        .map_or(true, |r| now.saturating_sub(r.join_time) < new_arrival_window);

    let is_crowded = cell_occupancy > crowd_limit;
    let should_alert = is_crowded && rank > crowd_limit && is_new_arrival;

    CrowdAssessment {
        cell,
        occupancy: cell_occupancy,
        rank,
        is_crowded,
        is_new_arrival,
        should_alert,
    }
}
