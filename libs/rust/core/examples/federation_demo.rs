/// Federation Demo - three nodes with uneven private data
///
/// Run with: cargo run --example federation_demo

use std::collections::HashMap;
use std::sync::Arc;

use federation_core::federated_learning::{AggregationMethod, LocalDataset, LogisticTrainer, Node, NodeId, RoundCoordinator};
use federation_core::NetworkSimulator;

fn main() -> anyhow::Result<()> {
    federation_core::init_tracing("federation-demo")?;
    println!("=== Federated Learning Demo ===\n");

    let trainer = Arc::new(LogisticTrainer::new(0.5, 5));
    let mut nodes = Vec::new();
    let mut datasets: HashMap<NodeId, LocalDataset> = HashMap::new();
    for (i, samples) in [50usize, 100, 150].into_iter().enumerate() {
        let data = LocalDataset::synthetic(samples, 2, i as u64);
        let mut node = Node::new(format!("node_{}", i + 1), 3, 10)
            .with_trainer(trainer.clone())
            .with_data_size(data.len() as u64);
        node.initialize();
        datasets.insert(node.id().clone(), data);
        nodes.push(node);
    }

    let coord = RoundCoordinator::new(10)
        .with_method(AggregationMethod::FedAvg)
        .with_network(NetworkSimulator::with_jitter(5, 5, 7));

    for _ in 0..5 {
        let report = coord.run_round_with(&mut nodes, &datasets)?;
        println!(
            "round {} | contributors {} | mean accuracy {:.3} | w[0..3] = {:?}",
            report.round,
            report.contributors.len(),
            report.mean_accuracy().unwrap_or_default(),
            &report.global_weights[..3],
        );
    }

    println!("\nfinal model version: {}", coord.model_version());
    Ok(())
}
