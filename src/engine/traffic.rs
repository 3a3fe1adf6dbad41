//! Synthetic request generation.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SimulationConfig;

/// Longest wait between two generated requests.
const MAX_DELAY: Duration = Duration::from_secs(3600);

/// Draws inter-arrival delays and client ids for the traffic driver.
#[derive(Debug, Clone)]
pub struct TrafficGenerator {
    rng: StdRng,
}

impl TrafficGenerator {
    /// A generator seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// A reproducible generator.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Delay before the next request.
    ///
    /// With a burst pattern the base interval is scaled by an independent
    /// factor in `[0.5, 1.5)`. Delays are capped at one hour.
    pub fn next_delay(&mut self, simulation: &SimulationConfig) -> Duration {
        let base_ms = simulation.base_interval_ms();
        let delay_ms = if simulation.burst_pattern {
            base_ms * (0.5 + self.rng.gen::<f64>())
        } else {
            base_ms
        };
        Duration::try_from_secs_f64(delay_ms / 1000.0)
            .map_or(MAX_DELAY, |delay| delay.min(MAX_DELAY))
    }

    /// A client id in `client-1..=client-<client_count>`.
    pub fn pick_client(&mut self, client_count: u32) -> String {
        let client = self.rng.gen_range(1..=client_count.max(1));
        format!("client-{}", client)
    }
}

impl Default for TrafficGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulation(rate: f64, burst_pattern: bool) -> SimulationConfig {
        SimulationConfig {
            request_rate: rate,
            burst_pattern,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_steady_delay() {
        let mut generator = TrafficGenerator::seeded(7);
        let delay = generator.next_delay(&simulation(20.0, false));
        assert_eq!(delay, Duration::from_millis(50));
    }

    #[test]
    fn test_burst_delay_within_bounds() {
        let mut generator = TrafficGenerator::seeded(42);
        let sim = simulation(10.0, true);

        let delays: Vec<_> = (0..500).map(|_| generator.next_delay(&sim)).collect();
        for delay in &delays {
            assert!(*delay >= Duration::from_millis(50), "{:?} below 0.5x", delay);
            assert!(*delay < Duration::from_millis(150), "{:?} at or above 1.5x", delay);
        }

        // Jitter actually varies the delay.
        assert!(delays.iter().any(|d| *d != delays[0]));
    }

    #[test]
    fn test_client_ids_in_range() {
        let mut generator = TrafficGenerator::seeded(1);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..400 {
            let client = generator.pick_client(4);
            let n: u32 = client.trim_start_matches("client-").parse().unwrap();
            assert!((1..=4).contains(&n));
            seen.insert(n);
        }
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_single_client() {
        let mut generator = TrafficGenerator::seeded(3);
        assert_eq!(generator.pick_client(1), "client-1");
    }

    #[test]
    fn test_seeded_generators_agree() {
        let sim = simulation(5.0, true);
        let mut a = TrafficGenerator::seeded(99);
        let mut b = TrafficGenerator::seeded(99);
        for _ in 0..10 {
            assert_eq!(a.next_delay(&sim), b.next_delay(&sim));
        }
    }

    #[test]
    fn test_delay_is_capped_for_unvalidated_rates() {
        let mut generator = TrafficGenerator::seeded(5);
        for rate in [1e-30, 0.0, f64::NAN] {
            assert_eq!(generator.next_delay(&simulation(rate, true)), MAX_DELAY);
        }
    }
}
