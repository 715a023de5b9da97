//! The Reservation Ledger - short-lived soft locks on candidate cells.
//!
//! When the recommendation engine points a participant at a cell it records
//! a reservation there. Other participants recommended in the next few
//! seconds see that cell as slightly fuller than its observed occupancy,
//! before the first participant's own presence update lands. Reservations
//! never reject anyone; they only bias the projected load.

use crate::grid::CellId;
use crowdflow_env::ParticipantId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// How long a reservation counts toward projected load.
pub const RESERVATION_TTL: Duration = Duration::from_secs(15);

/// A participant's advisory claim on a candidate cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub participant_id: ParticipantId,
    pub cell: CellId,
    pub reserved_at: Duration,
}

impl Reservation {
    /// True while `now - reserved_at <= ttl`.
    #[inline]
    pub fn is_live(&self, now: Duration, ttl: Duration) -> bool {
        now.saturating_sub(self.reserved_at) <= ttl
    }
}

/// Participant id -> their single current reservation.
#[derive(Debug, Default)]
pub struct ReservationLedger {
    by_participant: HashMap<ParticipantId, Reservation>,
}

impl ReservationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `cell` for a participant, replacing any earlier reservation.
    ///
    /// Returns the replaced reservation, if there was one.
    pub fn reserve(&mut self, participant_id: &ParticipantId, cell: CellId, now: Duration) -> Option<Reservation> {
        self.by_participant.insert(
            participant_id.clone(),
            Reservation {
                participant_id: participant_id.clone(),
                cell,
                reserved_at: now,
            },
        )
    }

    /// Drop a participant's reservation.
    pub fn release(&mut self, participant_id: &ParticipantId) -> Option<Reservation> {
        self.by_participant.remove(participant_id)
    }

    pub fn get(&self, participant_id: &ParticipantId) -> Option<&Reservation> {
        self.by_participant.get(participant_id)
    }

    /// The participant's reservation, if it is still live.
    pub fn get_live(&self, participant_id: &ParticipantId, now: Duration, ttl: Duration) -> Option<&Reservation> {
        self.get(participant_id).filter(|r| r.is_live(now, ttl))
    }

    /// Number of live reservations pointing at `cell`.
    ///
    /// `excluding` skips one participant, so a participant's own claim does
    /// not count against the cell while their recommendation is re-evaluated.
    pub fn live_count(
        &self,
        cell: CellId,
        now: Duration,
        ttl: Duration,
        excluding: Option<&ParticipantId>,
    ) -> usize {
        self.by_participant
            .values()
            .filter(|r| r.cell == cell && r.is_live(now, ttl))
            .filter(|r| excluding.map_or(true, |id| &r.participant_id != id))
            .count()
    }

    /// Remove every reservation older than `ttl`. Returns how many were dropped.
    pub fn prune_expired(&mut self, now: Duration, ttl: Duration) -> usize {
        let before = self.by_participant.len();
        self.by_participant.retain(|_, r| r.is_live(now, ttl));
        before - self.by_participant.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reservation> {
        self.by_participant.values()
    }

    /// Stored reservations, live or not.
    pub fn len(&self) -> usize {
        self.by_participant.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_participant.is_empty()
    }
}
