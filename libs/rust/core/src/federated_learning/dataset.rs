//! Local datasets and the sources the coordinator pulls them from.

use std::collections::HashMap;

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::node::NodeId;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalDataset {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<u32>,
}

impl LocalDataset {
    pub fn new(features: Vec<Vec<f64>>, labels: Vec<u32>) -> Self { Self { features, labels } }

    /// Seeded random dataset: features uniform in [0,1), label 1 when the
    /// feature sum exceeds half the feature count.
    pub fn synthetic(samples: usize, features: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let threshold = features as f64 / 2.0;
        let mut rows = Vec::with_capacity(samples);
        let mut labels = Vec::with_capacity(samples);
        for _ in 0..samples {
            let row: Vec<f64> = (0..features).map(|_| rng.gen::<f64>()).collect();
            labels.push(u32::from(row.iter().sum::<f64>() > threshold));
            rows.push(row);
        }
        Self { features: rows, labels }
    }

    pub fn len(&self) -> usize { self.labels.len() }
    pub fn is_empty(&self) -> bool { self.labels.is_empty() }
}

/// Supplies each node's training data for a round.
pub trait DatasetSource: Sync {
    fn dataset_for(&self, node: &NodeId) -> Option<(&[Vec<f64>], &[u32])>;
}

/// Every node trains on the same data.
impl DatasetSource for LocalDataset {
    fn dataset_for(&self, _node: &NodeId) -> Option<(&[Vec<f64>], &[u32])> { Some((&self.features, &self.labels)) }
}

impl<'a> DatasetSource for (&'a [Vec<f64>], &'a [u32]) {
    fn dataset_for(&self, _node: &NodeId) -> Option<(&[Vec<f64>], &[u32])> { Some((self.0, self.1)) }
}

/// Per-node private data.
impl DatasetSource for HashMap<NodeId, LocalDataset> {
    fn dataset_for(&self, node: &NodeId) -> Option<(&[Vec<f64>], &[u32])> {
        self.get(node).map(|d| (d.features.as_slice(), d.labels.as_slice()))
    }
}
