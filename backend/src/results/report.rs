//! Summary report lines
//!
//! One CSV line per simulation:
//!
//! ```text
//! label,specular,diffuse_reflectance,absorption,transmittance,penetration_depth
//! ```
//!
//! Lines are appended, so several batches can share one report file.

use crate::models::SimulationResult;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

/// Header naming the columns of [`summary_line`]
pub const SUMMARY_HEADER: &str = "label,specular,diffuse_reflectance,absorption,transmittance,penetration_depth";

/// Format the summary of `result` (without trailing newline)
///
/// Penetration depth is written as 0 when the absorption grid was not
/// recorded.
pub fn summary_line(result: &SimulationResult) -> String {
    let s = &result.summary;
    format!(
        "{},{},{},{},{},{}",
        result.label,
        s.specular_reflectance,
        s.diffuse_reflectance,
        s.absorption,
        s.transmittance,
        s.penetration_depth.unwrap_or(0.0)
    )
}

/// Append one summary line per result to `path`, creating the file if needed
pub fn append_summaries<'a, I>(path: &Path, results: I) -> io::Result<usize>
where
    I: IntoIterator<Item = &'a SimulationResult>,
{
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut written = 0;
    for result in results {
        writeln!(file, "{}", summary_line(result))?;
        written += 1;
    }
    Ok(written)
}
