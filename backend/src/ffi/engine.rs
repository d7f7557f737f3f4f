//! PyO3 entry point for batch runs

use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};
use std::path::PathBuf;

use super::types::{outcome_to_py, parse_simulation};
use crate::orchestrator::{run_simulations as run_batch, SimulationOutcome};
use crate::results::append_summaries;

/// Run a batch of simulations
///
/// # Example (from Python)
///
/// ```python
/// from photon_transport_core_rs import run_simulations
///
/// outcomes = run_simulations([sim], num_devices=2, seed=42, report_file="summary.csv")
/// print(outcomes[0]["status"], outcomes[0]["diffuse_reflectance"])
/// ```
///
/// The GIL is released while photons run. One dict is returned per input
/// dict, in order. When `report_file` is given, a summary line for every
/// completed simulation is appended to it.
///
/// # Errors
///
/// Raises ValueError for malformed simulation dicts and IOError when the
/// report file cannot be written. Invalid physical parameters and device
/// failures do not raise; they are reported per simulation.
#[pyfunction]
#[pyo3(signature = (simulations, num_devices = 1, seed = 0, report_file = None))]
pub fn run_simulations(
    py: Python<'_>,
    simulations: &Bound<'_, PyList>,
    num_devices: usize,
    seed: u64,
    report_file: Option<PathBuf>,
) -> PyResult<Py<PyList>> {
    let mut descriptors = Vec::with_capacity(simulations.len());
    for py_sim in simulations.iter() {
        let sim_dict: Bound<'_, PyDict> = py_sim.downcast_into()?;
        descriptors.push(parse_simulation(&sim_dict)?);
    }

    let outcomes: Vec<SimulationOutcome> = py.detach(|| run_batch(&descriptors, num_devices, seed));

    if let Some(path) = report_file {
        append_summaries(&path, outcomes.iter().filter_map(SimulationOutcome::result))
            .map_err(|e| PyErr::new::<pyo3::exceptions::PyIOError, _>(format!("{}: {}", path.display(), e)))?;
    }

    let list = PyList::empty(py);
    for outcome in &outcomes {
        list.append(outcome_to_py(py, outcome)?)?;
    }
    Ok(list.unbind())
}
