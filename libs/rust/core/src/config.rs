//! Layered federation configuration: defaults, then an optional file named by
//! `FEDERATION_CONFIG_FILE`, then `FEDERATION__*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::federated_learning::{AggregationMethod, LogisticTrainer, RoundCoordinator};
use crate::network::NetworkSimulator;

pub const CONFIG_FILE_ENV: &str = "FEDERATION_CONFIG_FILE";
pub const ENV_PREFIX: &str = "FEDERATION";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self { Self { max_retries: 2, base_delay_ms: 10, max_delay_ms: 200 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FederationConfig {
    pub node_count: usize,
    pub dimension: usize,
    pub rounds: u64,
    pub aggregation: AggregationMethod,
    pub min_participants: usize,
    pub network_delay_ms: u64,
    pub parallel: bool,
    pub samples_per_node: usize,
    pub feature_count: usize,
    pub learning_rate: f64,
    pub local_epochs: usize,
    pub seed: u64,
    pub retry: RetrySettings,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            node_count: 3,
            dimension: 10,
            rounds: 5,
            aggregation: AggregationMethod::Mean,
            min_participants: 1,
            network_delay_ms: 0,
            parallel: true,
            samples_per_node: 100,
            feature_count: 2,
            learning_rate: 0.1,
            local_epochs: 1,
            seed: 42,
            retry: RetrySettings::default(),
        }
    }
}

impl FederationConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.node_count > 0, "node_count must be positive");
        ensure!(self.dimension > 0, "dimension must be positive");
        ensure!(self.samples_per_node > 0, "samples_per_node must be positive");
        ensure!(self.min_participants <= self.node_count, "min_participants ({}) exceeds node_count ({})", self.min_participants, self.node_count);
        ensure!(self.learning_rate > 0.0 && self.learning_rate.is_finite(), "learning_rate must be positive");
        Ok(())
    }

    pub fn coordinator(&self) -> RoundCoordinator {
        let coord = RoundCoordinator::new(self.dimension)
            .with_method(self.aggregation)
            .with_min_participants(self.min_participants)
            .parallel(self.parallel);
        if self.network_delay_ms > 0 { coord.with_network(NetworkSimulator::new(self.network_delay_ms)) } else { coord }
    }

    pub fn trainer(&self) -> LogisticTrainer { LogisticTrainer::new(self.learning_rate, self.local_epochs) }
}

/// Loads configuration, honouring `FEDERATION_CONFIG_FILE` when set.
pub fn load_config() -> Result<FederationConfig> {
    let file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);
    load_config_from(file.as_deref())
}

pub fn load_config_from(file: Option<&Path>) -> Result<FederationConfig> {
    let d = FederationConfig::default();
    let mut builder = config::Config::builder()
        .set_default("node_count", d.node_count as i64)?
        .set_default("dimension", d.dimension as i64)?
        .set_default("rounds", d.rounds as i64)?
        .set_default("aggregation", d.aggregation.as_str())?
        .set_default("min_participants", d.min_participants as i64)?
        .set_default("network_delay_ms", d.network_delay_ms as i64)?
        .set_default("parallel", d.parallel)?
        .set_default("samples_per_node", d.samples_per_node as i64)?
        .set_default("feature_count", d.feature_count as i64)?
        .set_default("learning_rate", d.learning_rate)?
        .set_default("local_epochs", d.local_epochs as i64)?
        .set_default("seed", d.seed as i64)?
        .set_default("retry.max_retries", d.retry.max_retries as i64)?
        .set_default("retry.base_delay_ms", d.retry.base_delay_ms as i64)?
        .set_default("retry.max_delay_ms", d.retry.max_delay_ms as i64)?;
    if let Some(path) = file {
        builder = builder.add_source(config::File::from(path).required(true));
    }
    builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true));
    let cfg = builder.build().context("building federation config")?;
    let fed: FederationConfig = cfg.try_deserialize().context("deserializing federation config")?;
    fed.validate()?;
    Ok(fed)
}
