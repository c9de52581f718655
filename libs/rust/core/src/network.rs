//! Simulated communication latency between nodes and the coordinator.
//!
//! Only the lower bound of a delay is guaranteed; how much longer the wait
//! takes depends on the scheduler.

use std::time::Duration;

use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Blocks the calling thread for at least `duration_ms` milliseconds.
pub fn simulate_delay(duration_ms: u64) {
    if duration_ms > 0 { std::thread::sleep(Duration::from_millis(duration_ms)); }
}

/// Suspends the calling task for at least `duration_ms` milliseconds.
pub async fn simulate_delay_async(duration_ms: u64) {
    if duration_ms > 0 { tokio::time::sleep(Duration::from_millis(duration_ms)).await; }
}

/// Per-hop latency with optional additive jitter.
#[derive(Debug)]
pub struct NetworkSimulator {
    latency_ms: u64,
    jitter_ms: u64,
    rng: Mutex<StdRng>,
}

impl NetworkSimulator {
    pub fn new(latency_ms: u64) -> Self { Self::with_jitter(latency_ms, 0, 0) }

    pub fn with_jitter(latency_ms: u64, jitter_ms: u64, seed: u64) -> Self {
        Self { latency_ms, jitter_ms, rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }

    pub fn latency_ms(&self) -> u64 { self.latency_ms }

    pub fn sample_delay(&self) -> Duration {
        let extra = if self.jitter_ms == 0 { 0 } else { self.rng.lock().gen_range(0..=self.jitter_ms) };
        Duration::from_millis(self.latency_ms + extra)
    }

    /// Sleeps one hop. The jitter lock is released before sleeping.
    pub fn delay(&self) -> Duration {
        let d = self.sample_delay();
        if !d.is_zero() { std::thread::sleep(d); }
        d
    }

    pub async fn delay_async(&self) -> Duration {
        let d = self.sample_delay();
        if !d.is_zero() { tokio::time::sleep(d).await; }
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn blocking_delay_lower_bound() {
        let start = Instant::now();
        simulate_delay(50);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn async_delay_lower_bound() {
        let start = Instant::now();
        simulate_delay_async(20).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn jitter_only_adds() {
        let net = NetworkSimulator::with_jitter(5, 3, 11);
        for _ in 0..50 {
            let d = net.sample_delay();
            assert!(d >= Duration::from_millis(5) && d <= Duration::from_millis(8));
        }
        assert_eq!(NetworkSimulator::new(7).sample_delay(), Duration::from_millis(7));
    }

    #[test]
    fn hop_waits_at_least_latency() {
        let net = NetworkSimulator::new(10);
        let start = Instant::now();
        let d = net.delay();
        assert!(start.elapsed() >= d);
    }
}
