//! Federation participant: owns one local weight vector, one copy of the
//! global model and a count of local training examples.

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::trainer::{FixedTrainer, LocalTrainer, TrainingMetrics};
use crate::error::{FederationError, Result};

pub const DEFAULT_LOCAL_WEIGHT: f64 = 0.1;
pub const DEFAULT_DATA_SIZE: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn generate() -> Self { Self(format!("node-{}", Uuid::new_v4())) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self { Self(s.to_string()) }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self { Self(s) }
}

pub struct Node {
    id: NodeId,
    total_nodes: usize,
    local_weights: Vec<f64>,
    global_weights: Vec<f64>,
    data_size: u64,
    initialized: bool,
    trainer: Arc<dyn LocalTrainer>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("dimension", &self.dimension())
            .field("data_size", &self.data_size)
            .field("initialized", &self.initialized)
            .finish()
    }
}

impl Node {
    /// Registers a node of a federation of `total_nodes` members whose models have `dimension` weights.
    pub fn new(id: impl Into<NodeId>, total_nodes: usize, dimension: usize) -> Self {
        Self {
            id: id.into(),
            total_nodes,
            local_weights: vec![DEFAULT_LOCAL_WEIGHT; dimension],
            global_weights: vec![0.0; dimension],
            data_size: DEFAULT_DATA_SIZE,
            initialized: false,
            trainer: Arc::new(FixedTrainer::default()),
        }
    }

    pub fn with_trainer(mut self, trainer: Arc<dyn LocalTrainer>) -> Self { self.trainer = trainer; self }

    pub fn with_data_size(mut self, data_size: u64) -> Self { self.data_size = data_size; self }

    /// Replaces the starting local weights; the vector must match the node's dimensionality.
    pub fn with_initial_weights(mut self, weights: Vec<f64>) -> Result<Self> {
        self.check_dimension(weights.len())?;
        self.local_weights = weights;
        Ok(self)
    }

    /// Marks the node ready for training. Repeated calls leave state untouched.
    pub fn initialize(&mut self) {
        if !self.initialized {
            self.initialized = true;
            debug!(node = %self.id, dimension = self.dimension(), "node_initialized");
        }
    }

    /// Runs the external trainer against caller-owned data and commits the
    /// resulting weights only when the trainer's output is well-formed.
    pub fn local_train(&mut self, data: &[Vec<f64>], labels: &[u32]) -> Result<TrainingMetrics> {
        if !self.initialized { return Err(FederationError::not_initialized()); }
        let started = Instant::now();
        let mut candidate = self.local_weights.clone();
        let mut metrics = self.trainer.train(&mut candidate, data, labels).map_err(|e| self.training_error(e.to_string()))?;
        if candidate.len() != self.dimension() {
            return Err(self.training_error(format!("trainer changed dimensionality from {} to {}", self.dimension(), candidate.len())));
        }
        if !metrics.loss.is_finite() || metrics.loss < 0.0 {
            return Err(self.training_error(format!("invalid loss {}", metrics.loss)));
        }
        if metrics.accuracy.is_nan() {
            return Err(self.training_error("accuracy is NaN".into()));
        }
        metrics.accuracy = metrics.accuracy.clamp(0.0, 1.0);
        metrics.duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.local_weights = candidate;
        debug!(node = %self.id, accuracy = metrics.accuracy, loss = metrics.loss, "local_training_complete");
        Ok(metrics)
    }

    /// Accepts a coordinator-issued global model.
    pub fn update_global_model(&mut self, weights: &[f64]) -> Result<()> {
        if let Err(e) = self.check_dimension(weights.len()) {
            warn!(node = %self.id, error = %e, "global_model_rejected");
            return Err(e);
        }
        self.global_weights.clear();
        self.global_weights.extend_from_slice(weights);
        Ok(())
    }

    pub fn get_local_weights(&self) -> &[f64] { &self.local_weights }
    pub fn get_global_weights(&self) -> &[f64] { &self.global_weights }
    pub fn get_data_size(&self) -> u64 { self.data_size }
    pub fn set_data_size(&mut self, data_size: u64) { self.data_size = data_size; }
    pub fn id(&self) -> &NodeId { &self.id }
    pub fn dimension(&self) -> usize { self.global_weights.len() }
    pub fn total_nodes(&self) -> usize { self.total_nodes }
    pub fn is_initialized(&self) -> bool { self.initialized }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        if actual != self.dimension() {
            return Err(FederationError::DimensionMismatch { expected: self.dimension(), actual });
        }
        Ok(())
    }

    fn training_error(&self, reason: String) -> FederationError {
        FederationError::Training { node: self.id.clone(), reason }
    }
}
