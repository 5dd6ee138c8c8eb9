//! AS-level topology: graph model, distance oracle, and visibility policy.

pub mod graph;
pub mod visibility;

// Re-export commonly used types
pub use graph::{AsNumber, DistanceOracle, TopologyGraph, UNREACHABLE};
pub use visibility::{AnalyzedAses, VisibilityMode};
