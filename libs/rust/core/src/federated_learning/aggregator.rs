//! Weight aggregation strategies.
//!
//! `Mean` is the plain element-wise average. `FedAvg` weights each
//! contribution by its share of the total training examples (McMahan et al.).
//! Both are pure functions of their inputs and accumulate in f64.

use std::time::Instant;

use opentelemetry::KeyValue;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::node::NodeId;
use crate::error::{FederationError, Result};
use crate::telemetry::FEDERATION_METRICS;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    #[default]
    Mean,
    FedAvg,
}

impl AggregationMethod {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Mean => "mean", Self::FedAvg => "fed_avg" }
    }
}

/// One node's entry in an aggregation call.
#[derive(Clone, Debug)]
pub struct Contribution {
    pub node: NodeId,
    pub weights: Vec<f64>,
    pub data_size: u64,
}

/// Combines local weight vectors into one global vector.
///
/// With `data_sizes`, node `i` carries weight `data_sizes[i] / sum(data_sizes)`;
/// without, every vector counts equally.
pub fn aggregate<W: AsRef<[f64]>>(weights_list: &[W], data_sizes: Option<&[u64]>) -> Result<Vec<f64>> {
    let dim = validate(weights_list)?;
    match data_sizes {
        None => {
            let mut acc = vec![0.0f64; dim];
            for w in weights_list {
                for (a, v) in acc.iter_mut().zip(w.as_ref()) { *a += *v; }
            }
            let n = weights_list.len() as f64;
            acc.iter_mut().for_each(|a| *a /= n);
            Ok(acc)
        }
        Some(sizes) => {
            if sizes.len() != weights_list.len() {
                return Err(FederationError::DataSizeMismatch { weights: weights_list.len(), data_sizes: sizes.len() });
            }
            let total: f64 = sizes.iter().map(|s| *s as f64).sum();
            if total <= 0.0 { return Err(FederationError::ZeroTotalDataSize); }
            let mut acc = vec![0.0f64; dim];
            for (w, size) in weights_list.iter().zip(sizes) {
                let share = *size as f64 / total;
                for (a, v) in acc.iter_mut().zip(w.as_ref()) { *a += *v * share; }
            }
            Ok(acc)
        }
    }
}

fn validate<W: AsRef<[f64]>>(weights_list: &[W]) -> Result<usize> {
    let first = weights_list.first().ok_or(FederationError::EmptyInput)?;
    let dim = first.as_ref().len();
    if dim == 0 {
        return Err(FederationError::ShapeMismatch { expected: 1, actual: 0, index: 0 });
    }
    for (index, w) in weights_list.iter().enumerate().skip(1) {
        let actual = w.as_ref().len();
        if actual != dim { return Err(FederationError::ShapeMismatch { expected: dim, actual, index }); }
    }
    Ok(dim)
}

#[derive(Clone, Debug, Default)]
pub struct Aggregator {
    method: AggregationMethod,
}

impl Aggregator {
    pub fn new(method: AggregationMethod) -> Self { Self { method } }
    pub fn method(&self) -> AggregationMethod { self.method }

    pub fn aggregate(&self, contributions: &[Contribution]) -> Result<Vec<f64>> {
        let started = Instant::now();
        let weights: Vec<&[f64]> = contributions.iter().map(|c| c.weights.as_slice()).collect();
        let result = match self.method {
            AggregationMethod::Mean => aggregate(&weights, None),
            AggregationMethod::FedAvg => {
                let sizes: Vec<u64> = contributions.iter().map(|c| c.data_size).collect();
                aggregate(&weights, Some(sizes.as_slice()))
            }
        }?;
        let latency = started.elapsed().as_secs_f64() * 1000.0;
        FEDERATION_METRICS.aggregation_latency_ms.record(latency, &[KeyValue::new("method", self.method.as_str())]);
        debug!(method = self.method.as_str(), contributors = contributions.len(), latency_ms = latency, "weights_aggregated");
        Ok(result)
    }
}
