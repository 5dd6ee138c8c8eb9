//! Correlation analysis: duplicate search, spike grouping, classification,
//! and aggregation of the per-spike outcomes.

pub mod aggregator;
pub mod group;
pub mod matcher;
pub mod results;
pub mod stats;

// Re-export commonly used types
pub use aggregator::{Aggregator, BucketResult, ClassificationMode};
pub use group::SpikeGroup;
pub use matcher::DuplicationMatcher;
pub use results::{
    AdvancedClassificationResult, BasicClassificationResult, ClassificationResults,
    DuplicationStats,
};
pub use stats::{Quartiles, SpikeClassStats};
