//! Engine and device errors

use crate::models::DescriptorError;
use crate::orchestrator::device::DeviceId;
use thiserror::Error;

/// Failure of a single compute device
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DeviceError {
    #[error("{device} failed to run a wave: {reason}")]
    LaunchFailed { device: DeviceId, reason: String },

    #[error("No compute devices available")]
    NoDevices,

    #[error("Failed to build worker pool: {0}")]
    PoolBuild(String),
}

/// Why a simulation did not produce a complete result
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("Invalid simulation: {0}")]
    Configuration(#[from] DescriptorError),

    #[error("Invalid engine config: {0}")]
    InvalidEngineConfig(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Simulation cancelled")]
    Cancelled,

    #[error("Checkpoint does not match simulation: {0}")]
    CheckpointMismatch(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<DeviceError> for EngineError {
    fn from(err: DeviceError) -> Self {
        EngineError::DeviceUnavailable(err.to_string())
    }
}
