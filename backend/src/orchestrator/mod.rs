//! Orchestrator - devices, batch scheduling and checkpoints
//!
//! Turns a list of simulation descriptors into one outcome per descriptor:
//!
//! 1. **Admission**: validate each descriptor, hash it, build its kernel
//! 2. **Scheduling**: split photon ranges into waves over the device pool
//! 3. **Collection**: drain device tallies into per-simulation tallies
//! 4. **Aggregation**: normalize completed tallies into results
//!
//! See `scheduler.rs` for the work model.

pub mod checkpoint;
pub mod config;
pub mod device;
pub mod error;
pub mod outcome;
pub mod scheduler;

pub use checkpoint::{compute_descriptor_hash, validate_checkpoint, PhotonRange, TallyCheckpoint};
pub use config::EngineConfig;
pub use device::{ComputeDevice, CpuDevice, DeviceId, DevicePool, WaveLaunch, WaveReport};
pub use error::{DeviceError, EngineError};
pub use outcome::{OutcomeStatus, PartialSimulation, SimulationFailure, SimulationOutcome};
pub use scheduler::{
    run_simulations, run_simulations_with_config, BatchReport, BatchScheduler, CancellationToken, DeviceStats,
    SimulationJob,
};
