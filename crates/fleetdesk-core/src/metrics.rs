//! Operational metrics for the auth store
//!
//! A bounded rolling buffer of latency samples, an exponentially-weighted
//! stability score, and failure/offline counters. Alerts are signals for
//! external observers; nothing here breaks a circuit.

use chrono::{DateTime, Local};
use fleetdesk_api::MetricsSummary;
use std::collections::VecDeque;
use tracing::warn;

/// Bound on the latency sample buffer (oldest evicted first)
pub const MAX_LATENCY_SAMPLES: usize = 100;

/// A single sample above this is reported as a slow operation
pub const SLOW_OPERATION_MS: f64 = 5000.0;

/// Stability alert fires when the score drops to or below this
pub const STABILITY_ALERT_THRESHOLD: f64 = 95.0;

/// Failure alert fires on every Nth failed operation
pub const FAILURE_ALERT_EVERY: u64 = 5;

/// EWMA smoothing factor for the stability score
const STABILITY_ALPHA: f64 = 0.05;

/// Non-fatal warning signals emitted by the collector
#[derive(Debug, Clone, PartialEq)]
pub enum MetricsAlert {
    /// A single operation exceeded the slow-operation threshold
    SlowOperation { latency_ms: f64 },

    /// The stability score crossed below the alert threshold
    StabilityDegraded { score: f64 },

    /// The failed-operation counter reached a multiple of the alert stride
    FailureThreshold { count: u64 },
}

/// Rolling operational metrics
#[derive(Debug)]
pub struct MetricsCollector {
    latency_samples: VecDeque<f64>,
    stability: f64,
    failed_operations: u64,
    offline_operations: u64,
    last_update: DateTime<Local>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            latency_samples: VecDeque::with_capacity(MAX_LATENCY_SAMPLES),
            stability: 100.0,
            failed_operations: 0,
            offline_operations: 0,
            last_update: fleetdesk_util::now(),
        }
    }

    /// Append a latency sample, evicting the oldest beyond the bound
    pub fn record_latency(&mut self, latency_ms: f64) -> Option<MetricsAlert> {
        if self.latency_samples.len() == MAX_LATENCY_SAMPLES {
            self.latency_samples.pop_front();
        }
        self.latency_samples.push_back(latency_ms);
        self.last_update = fleetdesk_util::now();

        if latency_ms > SLOW_OPERATION_MS {
            warn!(latency_ms, "Slow auth operation");
            return Some(MetricsAlert::SlowOperation { latency_ms });
        }
        None
    }

    /// Apply one EWMA step: `new = old*0.95 + (stable ? 100 : 0)*0.05`.
    /// Alerts once when the score crosses below the threshold.
    pub fn update_stability(&mut self, is_stable: bool) -> Option<MetricsAlert> {
        let previous = self.stability;
        let target = if is_stable { 100.0 } else { 0.0 };
        self.stability = previous * (1.0 - STABILITY_ALPHA) + target * STABILITY_ALPHA;
        self.last_update = fleetdesk_util::now();

        if previous > STABILITY_ALERT_THRESHOLD && self.stability <= STABILITY_ALERT_THRESHOLD {
            warn!(score = self.stability, "Session stability degraded");
            return Some(MetricsAlert::StabilityDegraded {
                score: self.stability,
            });
        }
        None
    }

    /// Count a failed operation; alerts on every 5th (5, 10, 15, ...)
    pub fn record_failed_operation(&mut self) -> Option<MetricsAlert> {
        self.failed_operations += 1;
        self.last_update = fleetdesk_util::now();

        if self.failed_operations % FAILURE_ALERT_EVERY == 0 {
            warn!(count = self.failed_operations, "Repeated auth operation failures");
            return Some(MetricsAlert::FailureThreshold {
                count: self.failed_operations,
            });
        }
        None
    }

    /// Count an operation deferred to the offline queue
    pub fn record_offline_operation(&mut self) {
        self.offline_operations += 1;
        self.last_update = fleetdesk_util::now();
    }

    /// Arithmetic mean of the current buffer, 0 if empty
    pub fn average_latency(&self) -> f64 {
        if self.latency_samples.is_empty() {
            return 0.0;
        }
        self.latency_samples.iter().sum::<f64>() / self.latency_samples.len() as f64
    }

    pub fn stability(&self) -> f64 {
        self.stability
    }

    pub fn failed_operations(&self) -> u64 {
        self.failed_operations
    }

    pub fn offline_operations(&self) -> u64 {
        self.offline_operations
    }

    pub fn sample_count(&self) -> usize {
        self.latency_samples.len()
    }

    /// Read-only composite for health checks. The cache layer owns hit/miss
    /// accounting, so the rate is passed in.
    pub fn summary(&self, cache_hit_rate: f64) -> MetricsSummary {
        MetricsSummary {
            average_auth_latency_ms: self.average_latency(),
            session_stability: self.stability,
            offline_operations: self.offline_operations,
            failed_operations: self.failed_operations,
            cache_hit_rate,
            last_update: self.last_update,
        }
    }

    /// Reset all counters and the buffer (sign-out)
    pub fn reset(&mut self) {
        self.latency_samples.clear();
        self.stability = 100.0;
        self.failed_operations = 0;
        self.offline_operations = 0;
        self.last_update = fleetdesk_util::now();
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_buffer_is_bounded() {
        let mut metrics = MetricsCollector::new();

        for i in 0..150 {
            metrics.record_latency(i as f64);
        }

        // Exactly the most recent 100 remain
        assert_eq!(metrics.sample_count(), 100);
        assert_eq!(metrics.average_latency(), (50..150).sum::<usize>() as f64 / 100.0);
    }

    #[test]
    fn slow_operation_alert() {
        let mut metrics = MetricsCollector::new();

        assert!(metrics.record_latency(4999.0).is_none());
        let alert = metrics.record_latency(5001.0);
        assert_eq!(
            alert,
            Some(MetricsAlert::SlowOperation { latency_ms: 5001.0 })
        );
    }

    #[test]
    fn stability_single_unstable_step() {
        let mut metrics = MetricsCollector::new();

        let alert = metrics.update_stability(false);
        // 100*0.95 + 0*0.05 = 95.0, which crosses the alert threshold
        assert!((metrics.stability() - 95.0).abs() < 1e-9);
        assert!(matches!(
            alert,
            Some(MetricsAlert::StabilityDegraded { score }) if (score - 95.0).abs() < 1e-9
        ));
    }

    #[test]
    fn stability_alert_fires_once_per_crossing() {
        let mut metrics = MetricsCollector::new();

        assert!(metrics.update_stability(false).is_some());
        // Already below the threshold: no repeat alert
        assert!(metrics.update_stability(false).is_none());
    }

    #[test]
    fn stability_recovers_toward_100() {
        let mut metrics = MetricsCollector::new();
        metrics.update_stability(false);

        let before = metrics.stability();
        metrics.update_stability(true);
        assert!(metrics.stability() > before);
    }

    #[test]
    fn failure_alert_every_fifth() {
        let mut metrics = MetricsCollector::new();

        for i in 1..=12u64 {
            let alert = metrics.record_failed_operation();
            if i % 5 == 0 {
                assert_eq!(alert, Some(MetricsAlert::FailureThreshold { count: i }));
            } else {
                assert!(alert.is_none());
            }
        }
        assert_eq!(metrics.failed_operations(), 12);
    }

    #[test]
    fn average_latency_empty_is_zero() {
        let metrics = MetricsCollector::new();
        assert_eq!(metrics.average_latency(), 0.0);
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut metrics = MetricsCollector::new();
        metrics.record_latency(100.0);
        metrics.update_stability(false);
        metrics.record_failed_operation();
        metrics.record_offline_operation();

        metrics.reset();

        assert_eq!(metrics.sample_count(), 0);
        assert_eq!(metrics.stability(), 100.0);
        assert_eq!(metrics.failed_operations(), 0);
        assert_eq!(metrics.offline_operations(), 0);
    }
}
