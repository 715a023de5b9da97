//! Common types shared between the CrowdFlow core and its collaborators.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a participant (a phone in the crowd).
///
/// The front end chooses the id; the core only requires it to be a
/// non-empty string and never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    /// Creates a ParticipantId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a new random ParticipantId.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the id is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a venue zone returned by the zone lookup.
pub type ZoneId = String;

/// Crowd density label produced by the image classifier or a steward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DensityLevel {
    Low = 1,
    Medium = 2,
    High = 3,
}

impl DensityLevel {
    /// Returns the numeric label (1-3).
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for DensityLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(DensityLevel::Low),
            2 => Ok(DensityLevel::Medium),
            3 => Ok(DensityLevel::High),
            other => Err(format!("density level must be 1, 2 or 3, got {}", other)),
        }
    }
}

impl From<DensityLevel> for u8 {
    fn from(level: DensityLevel) -> Self {
        level.as_u8()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_participant_id() {
        assert!(ParticipantId::new("  ").is_blank());
        assert!(!ParticipantId::new("p-1").is_blank());
    }

    #[test]
    fn test_density_level_labels() {
        assert_eq!(DensityLevel::try_from(2), Ok(DensityLevel::Medium));
        assert!(DensityLevel::try_from(0).is_err());
        assert!(DensityLevel::try_from(4).is_err());
        assert_eq!(u8::from(DensityLevel::High), 3);
    }
}
