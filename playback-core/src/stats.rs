use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::ErrorClass;
use serde::{Deserialize, Serialize};

// Surface statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceStats {
    pub sessions_opened: u64,
    pub stale_events_dropped: u64,
    pub recovery_attempts: HashMap<ErrorClass, u32>,
    pub successful_recoveries: u32,
    pub failures: u32,
    pub autoplay_blocked: u32,
    pub ignored_signals: u64,
    pub last_failure_at: Option<DateTime<Utc>>,
}

impl SurfaceStats {
    pub fn record_recovery(&mut self, class: ErrorClass) {
        *self.recovery_attempts.entry(class).or_insert(0) += 1;
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
        self.last_failure_at = Some(Utc::now());
    }

    pub fn recovery_attempts_for(&self, class: ErrorClass) -> u32 {
        self.recovery_attempts.get(&class).copied().unwrap_or(0)
    }

    pub fn total_recovery_attempts(&self) -> u32 {
        self.recovery_attempts.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_counters() {
        let mut stats = SurfaceStats::default();

        stats.record_recovery(ErrorClass::Stall);
        stats.record_recovery(ErrorClass::Stall);
        stats.record_recovery(ErrorClass::Network);

        assert_eq!(stats.recovery_attempts_for(ErrorClass::Stall), 2);
        assert_eq!(stats.recovery_attempts_for(ErrorClass::Media), 0);
        assert_eq!(stats.total_recovery_attempts(), 3);
    }

    #[test]
    fn test_failure_timestamp() {
        let mut stats = SurfaceStats::default();
        assert!(stats.last_failure_at.is_none());

        let before = Utc::now();
        stats.record_failure();

        assert_eq!(stats.failures, 1);
        assert!(stats.last_failure_at.is_some_and(|at| at >= before));
    }

    #[test]
    fn test_stats_serialize_to_json() {
        let mut stats = SurfaceStats::default();
        stats.record_recovery(ErrorClass::Media);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["recovery_attempts"]["media"], 1);
        assert!(json["last_failure_at"].is_null());
    }
}
