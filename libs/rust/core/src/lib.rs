//! Core library for federated learning rounds.
//!
//! Nodes train locally, the [`RoundCoordinator`] gathers their weights, an
//! [`Aggregator`] turns them into one global model and the coordinator pushes
//! that model back to every node. A [`NetworkSimulator`] can sit on every
//! node-to-coordinator hop to model communication latency.

pub mod config;
pub mod error;
pub mod federated_learning;
pub mod network;
pub mod telemetry;

pub use config::{load_config, load_config_from, FederationConfig, RetrySettings};
pub use error::{FederationError, Result};
pub use federated_learning::{
    aggregate, AggregationMethod, Aggregator, DatasetSource, FixedTrainer, GlobalModel, LocalDataset, LocalTrainer,
    LogisticTrainer, Node, NodeId, RoundCoordinator, RoundPhase, RoundReport, TrainingMetrics,
};
pub use network::{simulate_delay, simulate_delay_async, NetworkSimulator};
pub use telemetry::{init_tracing, FEDERATION_METRICS};
