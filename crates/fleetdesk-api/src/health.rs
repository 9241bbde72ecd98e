//! Health reporting types

use crate::MetricsSummary;
use serde::{Deserialize, Serialize};

/// Read-only health report, polled periodically by the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub is_healthy: bool,
    pub metrics: MetricsSummary,
    /// Human-readable description of each violated threshold
    pub issues: Vec<String>,
}

impl HealthReport {
    pub fn healthy(metrics: MetricsSummary) -> Self {
        Self {
            is_healthy: true,
            metrics,
            issues: Vec::new(),
        }
    }
}
