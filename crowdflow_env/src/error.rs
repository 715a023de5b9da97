//! Error types for the CrowdFlow collaborator abstraction.

use thiserror::Error;

/// Errors reported by external collaborators (zone table, density classifier).
///
/// The core never lets one of these abort a request; it is surfaced on the
/// single response field that depended on the collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    /// Collaborator could not be reached
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl CollaboratorError {
    /// Creates an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}
