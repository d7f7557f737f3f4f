//! Domain models for the transport engine

pub mod descriptor;
pub mod grid;
pub mod layer;
pub mod photon;
pub mod result;

// Re-exports
pub use descriptor::{DescriptorError, DescriptorLabels, OutputFormat, SimulationDescriptor};
pub use grid::DetectionGrid;
pub use layer::{Layer, LayerOptics, SlabSpec};
pub use photon::PhotonState;
pub use result::{AbsorptionDistribution, EscapeDistribution, Histogram2, ResultSummary, SimulationResult};
