//! MCI input decks
//!
//! The classic MCML text format:
//!
//! ```text
//! 1.0                      # file version
//! 1                        # number of runs
//!
//! slab.mco A               # output name, A(SCII) or B(inary)
//! 100000                   # photons
//! 0.01 0.01                # dz dr [cm]
//! 40 50 30                 # nz nr na
//! 1                        # number of layers
//! 1.0                      # n above
//! 1.37 1.0 100.0 0.9 0.1   # n mua mus g d, one line per layer
//! 1.0                      # n below
//! ```
//!
//! `#` starts a comment and blank lines are skipped. A layer with `mus = 0`
//! is glass.

use photon_transport_core_rs::models::{DescriptorLabels, OutputFormat};
use photon_transport_core_rs::{build_stack, DetectionGrid, SimulationDescriptor, SlabSpec};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MciError {
    #[error("line {line}: expected {expected}")]
    Malformed { line: usize, expected: &'static str },

    #[error("unexpected end of input while reading {0}")]
    UnexpectedEof(&'static str),
}

/// Data lines of a deck, comments and blank lines removed
struct Lines<'a> {
    inner: std::iter::Enumerate<std::str::Lines<'a>>,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            inner: text.lines().enumerate(),
        }
    }

    /// Next non-empty line with its 1-based number
    fn next_data(&mut self, what: &'static str) -> Result<(usize, &'a str), MciError> {
        for (i, line) in self.inner.by_ref() {
            let data = line.split('#').next().unwrap_or("").trim();
            if !data.is_empty() {
                return Ok((i + 1, data));
            }
        }
        Err(MciError::UnexpectedEof(what))
    }

    /// Exactly `N` whitespace-separated values
    fn values<T: FromStr, const N: usize>(&mut self, what: &'static str) -> Result<[T; N], MciError> {
        let (line, data) = self.next_data(what)?;
        let malformed = || MciError::Malformed { line, expected: what };

        let parsed: Vec<T> = data
            .split_whitespace()
            .map(|token| token.parse().map_err(|_| malformed()))
            .collect::<Result<_, _>>()?;
        parsed.try_into().map_err(|_| malformed())
    }

    fn value<T: FromStr>(&mut self, what: &'static str) -> Result<T, MciError> {
        let [value] = self.values::<T, 1>(what)?;
        Ok(value)
    }
}

/// Parse every run of a deck
///
/// `input_name` is recorded as each descriptor's input label.
pub fn parse_mci(text: &str, input_name: &str) -> Result<Vec<SimulationDescriptor>, MciError> {
    let mut lines = Lines::new(text);

    let _version: f64 = lines.value("file version")?;
    let runs: usize = lines.value("number of runs")?;

    (0..runs).map(|_| parse_run(&mut lines, input_name)).collect()
}

fn parse_run(lines: &mut Lines<'_>, input_name: &str) -> Result<SimulationDescriptor, MciError> {
    let (line, data) = lines.next_data("output file name")?;
    let mut tokens = data.split_whitespace();
    let output = tokens
        .next()
        .filter(|name| name.starts_with(|c: char| c.is_ascii_alphabetic()))
        .ok_or(MciError::Malformed {
            line,
            expected: "output file name",
        })?;
    let format = match tokens.next() {
        Some(flag) if flag.eq_ignore_ascii_case("b") => OutputFormat::Binary,
        _ => OutputFormat::Ascii,
    };

    let photons: u64 = lines.value("number of photons")?;
    let [dz, dr] = lines.values::<f64, 2>("dz dr")?;
    let [nz, nr, na] = lines.values::<usize, 3>("nz nr na")?;
    let n_layers: usize = lines.value("number of layers")?;
    let n_above: f64 = lines.value("refractive index above")?;

    let slabs = (0..n_layers)
        .map(|_| {
            let [n, mua, mus, g, thickness] = lines.values::<f64, 5>("n mua mus g d")?;
            Ok(SlabSpec {
                n,
                mua,
                mus,
                g,
                thickness,
            })
        })
        .collect::<Result<Vec<_>, MciError>>()?;

    let n_below: f64 = lines.value("refractive index below")?;

    let mut descriptor = SimulationDescriptor::new(
        build_stack(n_above, &slabs, n_below),
        DetectionGrid { dr, dz, nr, nz, na },
        photons,
    );
    descriptor.labels = DescriptorLabels {
        input: input_name.to_string(),
        output: output.to_string(),
        format,
    };
    Ok(descriptor)
}
