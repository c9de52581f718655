//! Local training routines.
//!
//! The learning algorithm is an external collaborator: anything implementing
//! [`LocalTrainer`] can be plugged into a [`Node`](super::Node). Two routines
//! ship with the crate, a fixed-output trainer for deterministic scenarios and
//! a small logistic-regression trainer for simulations.

use anyhow::ensure;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub accuracy: f64,
    pub loss: f64,
    pub samples: usize,
    pub duration_ms: f64,
}

impl TrainingMetrics {
    pub fn new(accuracy: f64, loss: f64) -> Self { Self { accuracy, loss, samples: 0, duration_ms: 0.0 } }
    pub fn with_samples(mut self, samples: usize) -> Self { self.samples = samples; self }
}

pub trait LocalTrainer: Send + Sync {
    /// Trains `weights` in place on read-only data and reports accuracy in [0,1] and a non-negative loss.
    fn train(&self, weights: &mut [f64], data: &[Vec<f64>], labels: &[u32]) -> anyhow::Result<TrainingMetrics>;
}

/// Sets every weight to `value` and reports fixed metrics.
#[derive(Debug, Clone)]
pub struct FixedTrainer {
    pub value: f64,
    pub accuracy: f64,
    pub loss: f64,
}

impl Default for FixedTrainer { fn default() -> Self { Self { value: 0.2, accuracy: 0.8, loss: 0.2 } } }

impl LocalTrainer for FixedTrainer {
    fn train(&self, weights: &mut [f64], data: &[Vec<f64>], _labels: &[u32]) -> anyhow::Result<TrainingMetrics> {
        weights.iter_mut().for_each(|w| *w = self.value);
        Ok(TrainingMetrics::new(self.accuracy, self.loss).with_samples(data.len()))
    }
}

/// Full-batch gradient descent on a logistic model. The last weight is the
/// bias; the leading `min(dim - 1, features)` weights are coefficients and
/// any remaining weights are left as they are. An empty training set leaves
/// the model untouched and reports zero loss and accuracy.
#[derive(Debug, Clone)]
pub struct LogisticTrainer {
    pub learning_rate: f64,
    pub epochs: usize,
}

impl Default for LogisticTrainer { fn default() -> Self { Self { learning_rate: 0.1, epochs: 1 } } }

const PROB_EPS: f64 = 1e-12;

fn sigmoid(z: f64) -> f64 { 1.0 / (1.0 + (-z).exp()) }

impl LogisticTrainer {
    pub fn new(learning_rate: f64, epochs: usize) -> Self { Self { learning_rate, epochs } }

    fn predict(weights: &[f64], coefs: usize, row: &[f64]) -> f64 {
        let bias = weights[weights.len() - 1];
        let z = weights[..coefs].iter().zip(row).map(|(w, x)| w * x).sum::<f64>() + bias;
        sigmoid(z)
    }
}

impl LocalTrainer for LogisticTrainer {
    fn train(&self, weights: &mut [f64], data: &[Vec<f64>], labels: &[u32]) -> anyhow::Result<TrainingMetrics> {
        ensure!(!weights.is_empty(), "model has no weights");
        ensure!(data.len() == labels.len(), "{} samples but {} labels", data.len(), labels.len());
        if data.is_empty() { return Ok(TrainingMetrics::new(0.0, 0.0)); }
        let n = data.len() as f64;
        let bias_idx = weights.len() - 1;
        let coefs = data.iter().map(|r| r.len()).min().unwrap_or(0).min(bias_idx);
        let target = |y: u32| if y > 0 { 1.0 } else { 0.0 };

        for _ in 0..self.epochs {
            let mut grad = vec![0.0f64; coefs];
            let mut grad_bias = 0.0;
            for (row, &y) in data.iter().zip(labels) {
                let err = Self::predict(weights, coefs, row) - target(y);
                for (g, x) in grad.iter_mut().zip(row) { *g += err * x; }
                grad_bias += err;
            }
            for (w, g) in weights[..coefs].iter_mut().zip(&grad) { *w -= self.learning_rate * g / n; }
            weights[bias_idx] -= self.learning_rate * grad_bias / n;
        }

        let mut loss = 0.0;
        let mut correct = 0usize;
        for (row, &y) in data.iter().zip(labels) {
            let p = Self::predict(weights, coefs, row).clamp(PROB_EPS, 1.0 - PROB_EPS);
            let t = target(y);
            loss -= t * p.ln() + (1.0 - t) * (1.0 - p).ln();
            if (p >= 0.5) == (t == 1.0) { correct += 1; }
        }
        Ok(TrainingMetrics::new(correct as f64 / n, loss / n).with_samples(data.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<u32>) {
        let data = vec![vec![0.0, 0.1], vec![0.1, 0.0], vec![0.9, 1.0], vec![1.0, 0.9]];
        (data, vec![0, 0, 1, 1])
    }

    #[test]
    fn fixed_trainer_overwrites_weights() {
        let mut w = vec![0.1; 5];
        let m = FixedTrainer::default().train(&mut w, &[vec![1.0]], &[1]).unwrap();
        assert_eq!(w, vec![0.2; 5]);
        assert_eq!(m.samples, 1);
    }

    #[test]
    fn logistic_reduces_loss() {
        let (x, y) = separable();
        let mut w = vec![0.0; 3];
        let first = LogisticTrainer::new(0.5, 1).train(&mut w, &x, &y).unwrap();
        let later = LogisticTrainer::new(0.5, 200).train(&mut w, &x, &y).unwrap();
        assert!(later.loss < first.loss);
        assert!((0.0..=1.0).contains(&later.accuracy));
        assert_eq!(later.accuracy, 1.0);
    }

    #[test]
    fn logistic_leaves_surplus_weights() {
        let (x, y) = separable();
        let mut w = vec![0.7; 10];
        LogisticTrainer::default().train(&mut w, &x, &y).unwrap();
        assert!(w[2..9].iter().all(|v| *v == 0.7));
        assert_ne!(w[0], 0.7);
        assert_ne!(w[9], 0.7);
    }

    #[test]
    fn logistic_is_deterministic() {
        let (x, y) = separable();
        let (mut a, mut b) = (vec![0.1; 4], vec![0.1; 4]);
        let t = LogisticTrainer::new(0.3, 5);
        assert_eq!(t.train(&mut a, &x, &y).unwrap(), t.train(&mut b, &x, &y).unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn logistic_rejects_mismatched_labels() {
        let mut w = vec![0.0; 3];
        assert!(LogisticTrainer::default().train(&mut w, &[vec![1.0]], &[1, 0]).is_err());
    }

    #[test]
    fn logistic_empty_set_keeps_weights() {
        let mut w = vec![0.3; 3];
        let m = LogisticTrainer::default().train(&mut w, &[], &[]).unwrap();
        assert_eq!(w, vec![0.3; 3]);
        assert_eq!(m.samples, 0);
        assert_eq!((m.accuracy, m.loss), (0.0, 0.0));
    }
}
