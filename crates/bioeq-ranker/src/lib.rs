//! bioeq-ranker — evidence reliability scoring and CVintra aggregation.

pub mod aggregate;
pub mod reliability;
pub mod weights;

pub use aggregate::{AggregationConfig, AggregationMethod, Aggregator};
pub use reliability::ReliabilityRanker;
pub use weights::ReliabilityWeights;
