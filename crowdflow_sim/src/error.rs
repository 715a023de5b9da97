//! Errors raised while setting up or driving a simulation.

use crowdflow_core::RequestError;
use crowdflow_env::ParticipantId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("Invalid noise model: {0}")]
    InvalidNoise(String),

    #[error("Unknown participant: {0}")]
    UnknownParticipant(ParticipantId),

    #[error("Service rejected request: {0}")]
    Request(#[from] RequestError),
}
