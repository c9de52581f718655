use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use federation_core::federated_learning::{LocalDataset, Node, NodeId, RoundCoordinator, RoundReport};
use federation_core::{FederationConfig, FederationError};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::info;

use crate::retry::{retry_async, RetryConfig};

#[derive(Debug, Error)]
pub enum RoundError {
    #[error(transparent)]
    Federation(#[from] FederationError),
    #[error("round worker failed: {0}")]
    Worker(String),
}

impl RoundError {
    fn is_retryable(&self) -> bool { matches!(self, Self::Federation(e) if e.is_retryable()) }
}

struct FederationState {
    coordinator: RoundCoordinator,
    nodes: Vec<Node>,
    datasets: HashMap<NodeId, LocalDataset>,
}

impl FederationState {
    fn run_round(&mut self) -> federation_core::Result<RoundReport> {
        self.coordinator.run_round_with(&mut self.nodes, &self.datasets)
    }
}

/// Owns a simulated federation: nodes with uneven synthetic datasets and the round coordinator.
pub struct FederationModule {
    state: Arc<Mutex<FederationState>>,
    retry: RetryConfig,
    rounds: u64,
}

impl FederationModule {
    pub async fn new(cfg: FederationConfig) -> Result<Self> {
        cfg.validate()?;
        let trainer = Arc::new(cfg.trainer());
        let mut nodes = Vec::with_capacity(cfg.node_count);
        let mut datasets = HashMap::with_capacity(cfg.node_count);
        for i in 0..cfg.node_count {
            let data = LocalDataset::synthetic(cfg.samples_per_node * (i + 1), cfg.feature_count, cfg.seed + i as u64);
            let mut node = Node::new(format!("node_{}", i + 1), cfg.node_count, cfg.dimension)
                .with_trainer(trainer.clone())
                .with_data_size(data.len() as u64);
            node.initialize();
            datasets.insert(node.id().clone(), data);
            nodes.push(node);
        }
        let coordinator = cfg.coordinator();
        info!(nodes = cfg.node_count, dimension = cfg.dimension, method = cfg.aggregation.as_str(), "federation_module_initialized");
        Ok(Self {
            state: Arc::new(Mutex::new(FederationState { coordinator, nodes, datasets })),
            retry: RetryConfig::from(&cfg.retry),
            rounds: cfg.rounds,
        })
    }

    /// Runs one round on a blocking worker, retrying aborts caused by missing participation.
    pub async fn run_round(&self) -> Result<RoundReport, RoundError> {
        retry_async(&self.retry, |_attempt| {
            let state = self.state.clone();
            async move {
                match tokio::task::spawn_blocking(move || state.lock().run_round()).await {
                    Ok(res) => res.map_err(RoundError::from),
                    Err(e) => Err(RoundError::Worker(e.to_string())),
                }
            }
        }, RoundError::is_retryable).await
    }

    pub async fn run(&self) -> Result<Vec<RoundReport>> {
        let mut reports = Vec::with_capacity(self.rounds as usize);
        for _ in 0..self.rounds {
            let report = self.run_round().await?;
            info!(round = report.round, report = %serde_json::to_string(&report)?, "round_report");
            reports.push(report);
        }
        Ok(reports)
    }

    pub fn model_version(&self) -> u64 { self.state.lock().coordinator.model_version() }

    pub async fn shutdown(&self) -> Result<()> {
        info!(model_version = self.model_version(), "federation_module_shutdown");
        Ok(())
    }
}
