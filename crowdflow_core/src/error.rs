//! Errors returned to callers of the crowd service.

use crowdflow_env::CollaboratorError;
use thiserror::Error;

/// Client-facing request errors. None of these mutate shared state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("Missing participant id")]
    MissingParticipantId,

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Invalid density report: {0}")]
    InvalidDensityReport(String),

    #[error("Invalid zone: {0}")]
    InvalidZone(String),

    #[error("Density classifier failed: {0}")]
    Classifier(#[from] CollaboratorError),
}
