//! Tracing subscriber setup and federation metric instruments.
//!
//! Instruments come from the global OpenTelemetry meter; without an installed
//! provider they are no-ops, so library users pay nothing unless they export.

use anyhow::Result;
use once_cell::sync::{Lazy, OnceCell};
use opentelemetry::metrics::{Counter, Histogram, Meter};
use tracing::info;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

pub const JSON_LOG_ENV: &str = "FEDERATION_JSON_LOG";

fn json_logging_enabled() -> bool {
    std::env::var(JSON_LOG_ENV).ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// Installs the global fmt subscriber once; later calls are no-ops.
pub fn init_tracing(service: &str) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| -> Result<()> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_line_number(true);
        let res = if json_logging_enabled() {
            builder.json().flatten_event(true).with_current_span(true).with_span_list(false).try_init()
        } else {
            builder.try_init()
        };
        res.map_err(|e| anyhow::anyhow!("tracing init failed: {e}"))
    })?;
    info!(target: "federation", service, "tracing initialized");
    Ok(())
}

#[derive(Clone, Debug)]
pub struct FederationMetrics {
    pub rounds_completed: Counter<u64>,
    pub rounds_aborted: Counter<u64>,
    pub updates_total: Counter<u64>,
    pub dropped_contributors: Counter<u64>,
    pub aggregation_latency_ms: Histogram<f64>,
    pub round_latency_ms: Histogram<f64>,
}

static FED_METER: Lazy<Meter> = Lazy::new(|| opentelemetry::global::meter("federation"));

pub static FEDERATION_METRICS: Lazy<FederationMetrics> = Lazy::new(|| {
    FederationMetrics {
        rounds_completed: FED_METER.u64_counter("fed_rounds_completed_total").with_description("Federated rounds completed").build(),
        rounds_aborted: FED_METER.u64_counter("fed_rounds_aborted_total").with_description("Federated rounds abandoned before broadcast").build(),
        updates_total: FED_METER.u64_counter("fed_updates_total").with_description("Local weight updates collected").build(),
        dropped_contributors: FED_METER.u64_counter("fed_dropped_contributors_total").with_description("Nodes dropped from a round").build(),
        aggregation_latency_ms: FED_METER.f64_histogram("fed_aggregation_latency_ms").with_description("Aggregation latency ms").with_unit("ms").build(),
        round_latency_ms: FED_METER.f64_histogram("fed_round_latency_ms").with_description("End-to-end round latency ms").with_unit("ms").build(),
    }
});
