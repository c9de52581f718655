//! Federated learning: nodes, aggregation, and round coordination.

pub mod aggregator;
pub mod coordinator;
pub mod dataset;
pub mod lifecycle;
pub mod node;
pub mod trainer;

pub use aggregator::{aggregate, AggregationMethod, Aggregator, Contribution};
pub use coordinator::{
    RoundCoordinator,
    RoundReport,
    DroppedNode,
    GlobalModel,
    RoundId,
    ModelVersion,
};
pub use dataset::{DatasetSource, LocalDataset};
pub use lifecycle::{RoundLifecycle, RoundPhase};
pub use node::{Node, NodeId};
pub use trainer::{FixedTrainer, LocalTrainer, LogisticTrainer, TrainingMetrics};
