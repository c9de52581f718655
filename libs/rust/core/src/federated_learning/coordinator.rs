use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use super::aggregator::{AggregationMethod, Aggregator, Contribution};
use super::dataset::DatasetSource;
use super::lifecycle::{RoundLifecycle, RoundPhase};
use super::node::{Node, NodeId};
use super::trainer::TrainingMetrics;
use crate::error::{FederationError, Result};
use crate::network::NetworkSimulator;
use crate::telemetry::FEDERATION_METRICS;

pub type RoundId = u64;
pub type ModelVersion = u64;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GlobalModel {
    pub version: ModelVersion,
    pub round: RoundId,
    pub weights: Vec<f64>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DroppedNode {
    pub node: NodeId,
    pub phase: RoundPhase,
    pub reason: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoundReport {
    pub round: RoundId,
    pub model_version: ModelVersion,
    pub method: AggregationMethod,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub contributors: Vec<NodeId>,
    pub dropped: Vec<DroppedNode>,
    pub global_weights: Vec<f64>,
    pub metrics: BTreeMap<NodeId, TrainingMetrics>,
    pub phase_durations_ms: Vec<(RoundPhase, f64)>,
}

impl RoundReport {
    pub fn mean_accuracy(&self) -> Option<f64> {
        if self.metrics.is_empty() { return None; }
        Some(self.metrics.values().map(|m| m.accuracy).sum::<f64>() / self.metrics.len() as f64)
    }
}

#[derive(Debug)]
struct Inner {
    current_round: RoundId,
    model_version: ModelVersion,
    global: Option<GlobalModel>,
    last_phase: Option<RoundPhase>,
}

/// Drives federation rounds: collect local weights, aggregate, broadcast.
///
/// A round either completes or is abandoned. Only a completed round advances
/// the round index and model version. Rounds on one coordinator run one at a time.
pub struct RoundCoordinator {
    dimension: usize,
    aggregator: Aggregator,
    min_participants: usize,
    network: Option<NetworkSimulator>,
    parallel: bool,
    round_guard: Mutex<()>,
    inner: RwLock<Inner>,
}

type Collected = std::result::Result<(Contribution, TrainingMetrics), FederationError>;

impl RoundCoordinator {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            aggregator: Aggregator::default(),
            min_participants: 1,
            network: None,
            parallel: true,
            round_guard: Mutex::new(()),
            inner: RwLock::new(Inner { current_round: 1, model_version: 0, global: None, last_phase: None }),
        }
    }

    pub fn with_method(mut self, method: AggregationMethod) -> Self { self.aggregator = Aggregator::new(method); self }

    /// Rounds with fewer contributors than this abort. Values below 1 are treated as 1.
    pub fn with_min_participants(mut self, n: usize) -> Self { self.min_participants = n.max(1); self }

    pub fn with_network(mut self, network: NetworkSimulator) -> Self { self.network = Some(network); self }

    pub fn parallel(mut self, parallel: bool) -> Self { self.parallel = parallel; self }

    pub fn dimension(&self) -> usize { self.dimension }
    pub fn method(&self) -> AggregationMethod { self.aggregator.method() }
    pub fn current_round(&self) -> RoundId { self.inner.read().current_round }
    pub fn model_version(&self) -> ModelVersion { self.inner.read().model_version }
    pub fn global_model(&self) -> Option<GlobalModel> { self.inner.read().global.clone() }
    pub fn last_phase(&self) -> Option<RoundPhase> { self.inner.read().last_phase }

    /// Runs one round in which every node trains on the same data.
    pub fn run_round(&self, nodes: &mut [Node], data: &[Vec<f64>], labels: &[u32]) -> Result<RoundReport> {
        self.run_round_with(nodes, &(data, labels))
    }

    /// Runs one round pulling each node's training data from `source`.
    ///
    /// Nodes whose training fails are dropped from the contributor set but
    /// still receive the new global model. The round aborts when fewer than
    /// `min_participants` nodes contribute or aggregation fails.
    pub fn run_round_with<S: DatasetSource + ?Sized>(&self, nodes: &mut [Node], source: &S) -> Result<RoundReport> {
        let _round = self.round_guard.lock();
        let round = self.current_round();
        let span = info_span!("fl_round", round, method = self.method().as_str());
        let _guard = span.enter();
        let started_at = Utc::now();
        let mut lifecycle = RoundLifecycle::new();
        info!(participants = nodes.len(), "round_started");

        let collected: Vec<Collected> = if self.parallel {
            nodes.par_iter_mut().map(|n| self.collect(n, source)).collect()
        } else {
            nodes.iter_mut().map(|n| self.collect(n, source)).collect()
        };

        let mut contributions = Vec::with_capacity(collected.len());
        let mut metrics = BTreeMap::new();
        let mut dropped = Vec::new();
        for (node, outcome) in nodes.iter().zip(collected) {
            match outcome {
                Ok((c, m)) => { metrics.insert(c.node.clone(), m); contributions.push(c); }
                Err(e) => {
                    warn!(node = %node.id(), error = %e, "contributor_dropped");
                    dropped.push(DroppedNode { node: node.id().clone(), phase: RoundPhase::Collecting, reason: e.to_string() });
                }
            }
        }
        FEDERATION_METRICS.updates_total.add(contributions.len() as u64, &[]);
        FEDERATION_METRICS.dropped_contributors.add(dropped.len() as u64, &[KeyValue::new("phase", "collecting")]);

        lifecycle.advance();
        if contributions.len() < self.min_participants {
            let err = if contributions.is_empty() {
                FederationError::EmptyInput
            } else {
                FederationError::InsufficientParticipants { needed: self.min_participants, actual: contributions.len() }
            };
            return Err(self.abort(&mut lifecycle, err));
        }
        let global = match self.aggregator.aggregate(&contributions) {
            Ok(g) if g.len() == self.dimension => g,
            Ok(g) => return Err(self.abort(&mut lifecycle, FederationError::DimensionMismatch { expected: self.dimension, actual: g.len() })),
            Err(e) => return Err(self.abort(&mut lifecycle, e)),
        };

        lifecycle.advance();
        let broadcast: Vec<Result<()>> = if self.parallel {
            nodes.par_iter_mut().map(|n| self.deliver(n, &global)).collect()
        } else {
            nodes.iter_mut().map(|n| self.deliver(n, &global)).collect()
        };
        let mut rejected = 0u64;
        for (node, outcome) in nodes.iter().zip(broadcast) {
            if let Err(e) = outcome {
                rejected += 1;
                dropped.push(DroppedNode { node: node.id().clone(), phase: RoundPhase::Broadcasting, reason: e.to_string() });
            }
        }
        if rejected > 0 {
            FEDERATION_METRICS.dropped_contributors.add(rejected, &[KeyValue::new("phase", "broadcasting")]);
        }
        lifecycle.advance();

        let completed_at = Utc::now();
        let model_version = {
            let mut inner = self.inner.write();
            inner.model_version += 1;
            inner.global = Some(GlobalModel { version: inner.model_version, round, weights: global.clone(), updated_at: completed_at });
            inner.current_round += 1;
            inner.last_phase = Some(RoundPhase::Complete);
            inner.model_version
        };
        let elapsed_ms = lifecycle.elapsed().as_secs_f64() * 1000.0;
        FEDERATION_METRICS.rounds_completed.add(1, &[]);
        FEDERATION_METRICS.round_latency_ms.record(elapsed_ms, &[]);
        info!(contributors = contributions.len(), dropped = dropped.len(), model_version, elapsed_ms, "round_completed");

        Ok(RoundReport {
            round,
            model_version,
            method: self.method(),
            started_at,
            completed_at,
            contributors: contributions.into_iter().map(|c| c.node).collect(),
            dropped,
            global_weights: global,
            metrics,
            phase_durations_ms: lifecycle.durations().iter().map(|(p, d)| (*p, d.as_secs_f64() * 1000.0)).collect(),
        })
    }

    fn collect<S: DatasetSource + ?Sized>(&self, node: &mut Node, source: &S) -> Collected {
        let (data, labels) = source.dataset_for(node.id()).ok_or_else(|| FederationError::MissingDataset(node.id().clone()))?;
        let metrics = node.local_train(data, labels)?;
        if let Some(net) = &self.network { net.delay(); }
        debug!(node = %node.id(), data_size = node.get_data_size(), "local_weights_received");
        Ok((Contribution { node: node.id().clone(), weights: node.get_local_weights().to_vec(), data_size: node.get_data_size() }, metrics))
    }

    fn deliver(&self, node: &mut Node, global: &[f64]) -> Result<()> {
        if let Some(net) = &self.network { net.delay(); }
        node.update_global_model(global)
    }

    fn abort(&self, lifecycle: &mut RoundLifecycle, err: FederationError) -> FederationError {
        lifecycle.abort();
        self.inner.write().last_phase = Some(RoundPhase::Aborted);
        FEDERATION_METRICS.rounds_aborted.add(1, &[]);
        warn!(error = %err, "round_aborted");
        err
    }
}
