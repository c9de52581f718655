//! Error taxonomy for federation operations.
//!
//! Every variant is a precondition violation surfaced to the caller as-is;
//! nothing in the core retries or substitutes a default.

use thiserror::Error;

use crate::federated_learning::NodeId;

pub type Result<T> = std::result::Result<T, FederationError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FederationError {
    /// Operation invoked before the node was initialized.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Aggregation attempted with zero contributors.
    #[error("no weights to aggregate")]
    EmptyInput,

    /// Vectors of inconsistent length passed to aggregation.
    #[error("shape mismatch at input {index}: expected length {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize, index: usize },

    /// Global model update with a wrong-length vector.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("data_sizes has {data_sizes} entries for {weights} weight vectors")]
    DataSizeMismatch { weights: usize, data_sizes: usize },

    #[error("weighted aggregation requires a positive total data size")]
    ZeroTotalDataSize,

    #[error("insufficient participants: needed {needed}, got {actual}")]
    InsufficientParticipants { needed: usize, actual: usize },

    #[error("no dataset available for node {0}")]
    MissingDataset(NodeId),

    #[error("training failed on node {node}: {reason}")]
    Training { node: NodeId, reason: String },
}

impl FederationError {
    pub fn not_initialized() -> Self { Self::InvalidState("agent not initialized".into()) }

    /// Round aborts caused by missing participation, which a later attempt may not hit.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EmptyInput | Self::InsufficientParticipants { .. })
    }
}
