use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Running tally of restore attempts that found something stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryStats {
    pub successes: u64,
    pub failures: u64,
    /// Restores the drift validator flagged as implausible.
    #[serde(default)]
    pub anomalies: u64,
    #[serde(default)]
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl RecoveryStats {
    pub fn attempts(&self) -> u64 {
        self.successes.saturating_add(self.failures)
    }

    /// `successes / attempts`, or 1.0 before any attempt.
    pub fn health_ratio(&self) -> f64 {
        match self.attempts() {
            0 => 1.0,
            n => self.successes as f64 / n as f64,
        }
    }

    pub fn is_healthy(&self, threshold: f64) -> bool {
        self.health_ratio() >= threshold
    }

    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.successes = self.successes.saturating_add(1);
        self.last_attempt_at = Some(at);
    }

    pub fn record_failure(&mut self, at: DateTime<Utc>) {
        self.failures = self.failures.saturating_add(1);
        self.last_attempt_at = Some(at);
    }

    pub fn record_anomaly(&mut self) {
        self.anomalies = self.anomalies.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stats_are_healthy() {
        let stats = RecoveryStats::default();
        assert_eq!(stats.health_ratio(), 1.0);
        assert!(stats.is_healthy(0.8));
    }

    #[test]
    fn ratio_below_threshold() {
        let mut stats = RecoveryStats::default();
        let now = Utc::now();
        for _ in 0..3 {
            stats.record_success(now);
        }
        stats.record_failure(now);
        assert_eq!(stats.health_ratio(), 0.75);
        assert!(!stats.is_healthy(0.8));

        stats.record_success(now);
        assert!(stats.is_healthy(0.8));
        assert_eq!(stats.attempts(), 5);
    }
}
