//! Conversions between Python simulation dicts and engine types
//!
//! Converts between Python dicts and engine types. Simulation dicts use the
//! field names of the classic GPU binding:
//!
//! ```python
//! {
//!     "outp_filename": "slab.mco",
//!     "inp_filename": "slab.mci",
//!     "AorB": "A",
//!     "number_of_photons": 100000,
//!     "ignoreAdetection": 0,
//!     "start_weight": 0.9725,          # optional, derived from n0/n1 otherwise
//!     "det": {"dr": 0.01, "dz": 0.01, "nr": 50, "nz": 40, "na": 30},
//!     "n_layers": 1,
//!     "layers": [                      # n_layers + 2 entries, ambient first/last
//!         {"n": 1.0},
//!         {"n": 1.37, "g": 0.9, "mua": 1.0, "mutr": 1/101, "z_min": 0.0, "z_max": 0.1},
//!         {"n": 1.0},
//!     ],
//! }
//! ```

use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use crate::models::{
    DescriptorLabels, DetectionGrid, EscapeDistribution, Layer, OutputFormat, SimulationDescriptor, SimulationResult,
};
use crate::orchestrator::SimulationOutcome;

// ========================================================================
// Dict Field Access
// ========================================================================

fn value_error(message: String) -> PyErr {
    PyErr::new::<pyo3::exceptions::PyValueError, _>(message)
}

/// Field `key` of `dict`; ValueError when absent, TypeError when mistyped
fn extract_required<T>(dict: &Bound<'_, PyDict>, key: &str) -> PyResult<T>
where
    for<'py> T: pyo3::FromPyObject<'py, 'py, Error = PyErr>,
{
    dict.get_item(key)?
        .ok_or_else(|| value_error(format!("Missing required field '{}'", key)))?
        .extract()
}

/// Field `key` of `dict` if present
fn extract_optional<T>(dict: &Bound<'_, PyDict>, key: &str) -> PyResult<Option<T>>
where
    for<'py> T: pyo3::FromPyObject<'py, 'py, Error = PyErr>,
{
    match dict.get_item(key)? {
        Some(value) => Ok(Some(value.extract()?)),
        None => Ok(None),
    }
}

/// Field `key` of `dict`, or `default` when absent
fn extract_with_default<T>(dict: &Bound<'_, PyDict>, key: &str, default: T) -> PyResult<T>
where
    for<'py> T: pyo3::FromPyObject<'py, 'py, Error = PyErr>,
{
    match dict.get_item(key)? {
        Some(value) => value.extract(),
        None => Ok(default),
    }
}

// ========================================================================
// Simulation Parsers
// ========================================================================

/// Convert a `det` dict to a DetectionGrid
pub fn parse_grid(py_det: &Bound<'_, PyDict>) -> PyResult<DetectionGrid> {
    Ok(DetectionGrid {
        dr: extract_required(py_det, "dr")?,
        dz: extract_required(py_det, "dz")?,
        nr: extract_required(py_det, "nr")?,
        nz: extract_required(py_det, "nz")?,
        na: extract_required(py_det, "na")?,
    })
}

/// Convert a layer dict to a Layer
///
/// Ambient layers only need `n`; everything else defaults to a
/// non-interacting medium.
pub fn parse_layer(py_layer: &Bound<'_, PyDict>) -> PyResult<Layer> {
    let ambient = Layer::ambient(extract_required(py_layer, "n")?);

    Ok(Layer {
        n: ambient.n,
        g: extract_with_default(py_layer, "g", ambient.g)?,
        mua: extract_with_default(py_layer, "mua", ambient.mua)?,
        mutr: extract_with_default(py_layer, "mutr", ambient.mutr)?,
        z_min: extract_with_default(py_layer, "z_min", ambient.z_min)?,
        z_max: extract_with_default(py_layer, "z_max", ambient.z_max)?,
    })
}

/// Convert a simulation dict to a SimulationDescriptor
///
/// # Errors
///
/// Fails on a missing field, a value of the wrong Python type, or an
/// `n_layers` that disagrees with the layer list.
pub fn parse_simulation(py_sim: &Bound<'_, PyDict>) -> PyResult<SimulationDescriptor> {
    let photons: u64 = extract_required(py_sim, "number_of_photons")?;

    let py_det: Bound<'_, PyDict> = py_sim
        .get_item("det")?
        .ok_or_else(|| value_error("Missing required field 'det'".to_string()))?
        .downcast_into()?;
    let grid = parse_grid(&py_det)?;

    let py_layers: Bound<'_, PyList> = py_sim
        .get_item("layers")?
        .ok_or_else(|| value_error("Missing required field 'layers'".to_string()))?
        .downcast_into()?;

    let mut layers = Vec::with_capacity(py_layers.len());
    for py_layer in py_layers.iter() {
        let layer_dict: Bound<'_, PyDict> = py_layer.downcast_into()?;
        layers.push(parse_layer(&layer_dict)?);
    }

    if let Some(n_layers) = extract_optional::<usize>(py_sim, "n_layers")? {
        if n_layers + 2 != layers.len() {
            return Err(value_error(format!(
                "n_layers is {} but {} layers were given (ambient layers included)",
                n_layers,
                layers.len()
            )));
        }
    }

    let mut descriptor = SimulationDescriptor::new(layers, grid, photons);

    if let Some(start_weight) = extract_optional::<f64>(py_sim, "start_weight")? {
        descriptor.start_weight = start_weight;
    }

    let ignore_absorption: i64 = extract_with_default(py_sim, "ignoreAdetection", 0)?;
    descriptor.record_absorption = ignore_absorption == 0;

    let format: String = extract_with_default(py_sim, "AorB", "A".to_string())?;
    descriptor.labels = DescriptorLabels {
        input: extract_with_default(py_sim, "inp_filename", String::new())?,
        output: extract_with_default(py_sim, "outp_filename", String::new())?,
        format: if format.eq_ignore_ascii_case("b") {
            OutputFormat::Binary
        } else {
            OutputFormat::Ascii
        },
    };

    Ok(descriptor)
}

// ========================================================================
// Result Converters
// ========================================================================

fn escape_to_py<'py>(py: Python<'py>, escape: &EscapeDistribution) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("total", escape.total)?;
    dict.set_item("by_radius", escape.by_radius.clone())?;
    dict.set_item("by_angle", escape.by_angle.clone())?;
    dict.set_item("per_cell", escape.per_cell.values().to_vec())?;
    Ok(dict)
}

/// Convert a SimulationResult to a Python dict
pub fn result_to_py<'py>(py: Python<'py>, result: &SimulationResult) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    let s = &result.summary;

    dict.set_item("label", &result.label)?;
    dict.set_item("descriptor_hash", &result.descriptor_hash)?;
    dict.set_item("photons", result.photons)?;
    dict.set_item("specular_reflectance", s.specular_reflectance)?;
    dict.set_item("diffuse_reflectance", s.diffuse_reflectance)?;
    dict.set_item("absorption", s.absorption)?;
    dict.set_item("transmittance", s.transmittance)?;
    dict.set_item("penetration_depth", s.penetration_depth)?;

    dict.set_item("A_l", result.absorption.by_layer.clone())?;
    dict.set_item("A_z", result.absorption.by_depth.clone())?;
    dict.set_item(
        "A_rz",
        result.absorption.density.as_ref().map(|h| h.values().to_vec()),
    )?;
    dict.set_item("Rd", escape_to_py(py, &result.reflectance)?)?;
    dict.set_item("Tt", escape_to_py(py, &result.transmittance)?)?;

    Ok(dict)
}

/// Convert a SimulationOutcome to a Python dict
///
/// `{"status": "completed" | "cancelled" | "failed", "label": ..., ...}` with
/// the result fields merged in when a result exists and `error` otherwise.
pub fn outcome_to_py<'py>(py: Python<'py>, outcome: &SimulationOutcome) -> PyResult<Bound<'py, PyDict>> {
    let dict = match outcome {
        SimulationOutcome::Completed(result) => result_to_py(py, result)?,
        SimulationOutcome::Cancelled(partial) => {
            let dict = match &partial.result {
                Some(result) => result_to_py(py, result)?,
                None => PyDict::new(py),
            };
            dict.set_item("photons_completed", partial.photons_completed)?;
            dict
        }
        SimulationOutcome::Failed(failure) => {
            let dict = PyDict::new(py);
            dict.set_item("error", failure.error.to_string())?;
            dict
        }
    };

    dict.set_item("status", outcome.status().as_str())?;
    dict.set_item("label", outcome.label())?;
    Ok(dict)
}
