//! Photon Transport Core - Rust Engine
//!
//! Multi-layer Monte Carlo photon transport (MCML method) with deterministic,
//! device-count independent execution.
//!
//! # Architecture
//!
//! - **core**: Fixed-point weight scale and physical constants
//! - **models**: Domain types (Layer, DetectionGrid, SimulationDescriptor, results)
//! - **rng**: Deterministic per-photon random streams
//! - **transport**: Photon random walk (boundaries, scattering, roulette)
//! - **accumulator**: Lock-free fixed-point histograms
//! - **results**: Normalization and summary reports
//! - **orchestrator**: Devices, batch scheduling, checkpoints
//!
//! # Critical Invariants
//!
//! 1. All tallies are u64 fixed-point units (`WEIGHT_SCALE` per unit weight)
//! 2. All randomness is deterministic (seed + global photon index)
//! 3. Every submitted simulation gets exactly one outcome
//! 4. FFI boundary is minimal and safe

// Module declarations
pub mod accumulator;
pub mod core;
pub mod models;
pub mod orchestrator;
pub mod results;
pub mod rng;
pub mod transport;

// Re-exports for convenience
pub use accumulator::{DetectionAccumulator, RawTally, TallyBin};
pub use core::WEIGHT_SCALE;
pub use models::{
    layer::{build_stack, SlabSpec},
    DescriptorError, DetectionGrid, Layer, SimulationDescriptor, SimulationResult,
};
pub use orchestrator::{
    run_simulations, run_simulations_with_config, BatchScheduler, CancellationToken, DevicePool, EngineConfig,
    EngineError, SimulationJob, SimulationOutcome, TallyCheckpoint,
};
pub use results::ResultAggregator;
pub use rng::RandomStreamProvider;
pub use transport::{RouletteConfig, TransportKernel};

// FFI module (when feature enabled)
#[cfg(feature = "pyo3")]
pub mod ffi;

// PyO3 exports (when feature enabled)
#[cfg(feature = "pyo3")]
use pyo3::prelude::*;

#[cfg(feature = "pyo3")]
#[pymodule]
fn photon_transport_core_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(ffi::engine::run_simulations, m)?)?;
    Ok(())
}
