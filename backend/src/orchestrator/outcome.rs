//! Per-simulation outcomes of a batch
//!
//! Every submitted simulation is reported exactly once, in input order, as
//! completed, cancelled (with whatever finished) or failed.

use crate::models::SimulationResult;
use crate::orchestrator::checkpoint::TallyCheckpoint;
use crate::orchestrator::error::EngineError;

/// What finished of a cancelled simulation
#[derive(Debug, Clone, PartialEq)]
pub struct PartialSimulation {
    pub label: String,

    pub photons_completed: u64,

    /// Result normalized by `photons_completed`; `None` if nothing finished
    pub result: Option<SimulationResult>,

    /// Resume point for [`crate::orchestrator::SimulationJob::resume`]
    pub checkpoint: TallyCheckpoint,
}

/// A simulation that produced no usable result
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationFailure {
    pub label: String,
    pub error: EngineError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Completed,
    Cancelled,
    Failed,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Completed => "completed",
            OutcomeStatus::Cancelled => "cancelled",
            OutcomeStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimulationOutcome {
    Completed(SimulationResult),
    Cancelled(PartialSimulation),
    Failed(SimulationFailure),
}

impl SimulationOutcome {
    pub fn status(&self) -> OutcomeStatus {
        match self {
            SimulationOutcome::Completed(_) => OutcomeStatus::Completed,
            SimulationOutcome::Cancelled(_) => OutcomeStatus::Cancelled,
            SimulationOutcome::Failed(_) => OutcomeStatus::Failed,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            SimulationOutcome::Completed(result) => &result.label,
            SimulationOutcome::Cancelled(partial) => &partial.label,
            SimulationOutcome::Failed(failure) => &failure.label,
        }
    }

    /// The complete result, if any
    pub fn result(&self) -> Option<&SimulationResult> {
        match self {
            SimulationOutcome::Completed(result) => Some(result),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<SimulationResult, EngineError> {
        match self {
            SimulationOutcome::Completed(result) => Ok(result),
            SimulationOutcome::Cancelled(_) => Err(EngineError::Cancelled),
            SimulationOutcome::Failed(failure) => Err(failure.error),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status() == OutcomeStatus::Completed
    }
}
