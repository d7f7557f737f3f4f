//! Result aggregation and reporting
//!
//! Turns raw fixed-point tallies into normalized physical quantities and
//! formats the per-simulation summary lines.

pub mod aggregator;
pub mod report;

pub use aggregator::{penetration_depth, ResultAggregator};
pub use report::{append_summaries, summary_line, SUMMARY_HEADER};
