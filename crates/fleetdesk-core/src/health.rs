//! Aggregate health evaluation
//!
//! Polled periodically by the agent; read-only over the metrics summary.

use fleetdesk_api::{HealthReport, MetricsSummary};

/// Stability must stay above this to be considered healthy
pub const HEALTHY_STABILITY_FLOOR: f64 = 95.0;

/// Average latency must stay below this to be considered healthy
pub const HEALTHY_LATENCY_CEILING_MS: f64 = 2000.0;

/// Cache hit rate must stay above this to be considered healthy
pub const HEALTHY_HIT_RATE_FLOOR: f64 = 70.0;

/// Hit rate only counts toward health once this many lookups were observed;
/// a cold cache is not unhealthy.
pub const MIN_LOOKUPS_FOR_HIT_RATE: u64 = 10;

/// Evaluate the health thresholds over a metrics summary. Each violated
/// threshold appends a human-readable issue.
pub fn evaluate_health(metrics: MetricsSummary, cache_lookups: u64) -> HealthReport {
    let mut issues = Vec::new();

    if metrics.session_stability <= HEALTHY_STABILITY_FLOOR {
        issues.push(format!(
            "session stability {:.1} at or below {:.0}",
            metrics.session_stability, HEALTHY_STABILITY_FLOOR
        ));
    }

    if metrics.average_auth_latency_ms >= HEALTHY_LATENCY_CEILING_MS {
        issues.push(format!(
            "average auth latency {:.0}ms at or above {:.0}ms",
            metrics.average_auth_latency_ms, HEALTHY_LATENCY_CEILING_MS
        ));
    }

    if cache_lookups >= MIN_LOOKUPS_FOR_HIT_RATE
        && metrics.cache_hit_rate <= HEALTHY_HIT_RATE_FLOOR
    {
        issues.push(format!(
            "cache hit rate {:.1}% at or below {:.0}%",
            metrics.cache_hit_rate, HEALTHY_HIT_RATE_FLOOR
        ));
    }

    HealthReport {
        is_healthy: issues.is_empty(),
        metrics,
        issues,
    }
}
