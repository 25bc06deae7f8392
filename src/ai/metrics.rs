//! Generation Usage Metrics
//!
//! Append-only log of generation outcomes, summarized over a trailing
//! window, globally or per family. Thread-safe for concurrent runs.
//!
//! ## Usage
//!
//! ```ignore
//! let metrics = MetricsRecorder::new(30);
//! metrics.record(UsageRecord::success(Family::Pattern, elapsed, true, false));
//! let summary = metrics.summary(7, None);
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::metrics as metrics_constants;
use crate::puzzle::Family;

// =============================================================================
// Usage Record
// =============================================================================

/// Outcome of one generation attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub timestamp: DateTime<Utc>,
    pub family: Family,
    pub success: bool,
    /// Final validation state after any correction
    pub validation_passed: bool,
    pub auto_corrected: bool,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub error_kind: Option<String>,
}

impl UsageRecord {
    pub fn success(
        family: Family,
        duration: Duration,
        validation_passed: bool,
        auto_corrected: bool,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            family,
            success: true,
            validation_passed,
            auto_corrected,
            duration,
            error_kind: None,
        }
    }

    pub fn failure(family: Family, duration: Duration, error_kind: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            family,
            success: false,
            validation_passed: false,
            auto_corrected: false,
            duration,
            error_kind: Some(error_kind.into()),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// =============================================================================
// Metrics Recorder
// =============================================================================

/// Thread-safe append log of usage records
pub struct MetricsRecorder {
    retention: TimeDelta,
    records: RwLock<Vec<UsageRecord>>,
}

/// Aggregated view over a window
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub window_days: i64,
    pub family: Option<Family>,
    pub total: usize,
    pub successes: usize,
    pub success_rate: f64,
    /// Share of successful generations that shipped with unresolved validation errors
    pub validation_failure_rate: f64,
    /// Share of successful generations whose answer was auto-corrected
    pub auto_correction_rate: f64,
    pub avg_duration_ms: f64,
    pub error_kinds: BTreeMap<String, usize>,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new(metrics_constants::RETENTION_DAYS)
    }
}

impl MetricsRecorder {
    pub fn new(retention_days: i64) -> Self {
        Self {
            retention: TimeDelta::days(retention_days.max(1)),
            records: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<UsageRecord>> {
        self.records.read().unwrap_or_else(|poisoned| {
            tracing::error!("Metrics records RwLock poisoned on read, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<UsageRecord>> {
        self.records.write().unwrap_or_else(|poisoned| {
            tracing::error!("Metrics records RwLock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Append a record, dropping records past retention
    pub fn record(&self, record: UsageRecord) {
        let cutoff = record.timestamp - self.retention;
        let mut records = self.write();
        records.retain(|r| r.timestamp >= cutoff);
        records.push(record);
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Copy of all retained records, oldest first
    pub fn records(&self) -> Vec<UsageRecord> {
        self.read().clone()
    }

    pub fn summary(&self, window_days: i64, family: Option<Family>) -> MetricsSummary {
        self.summary_at(Utc::now(), window_days, family)
    }

    pub fn summary_at(
        &self,
        now: DateTime<Utc>,
        window_days: i64,
        family: Option<Family>,
    ) -> MetricsSummary {
        let since = now - TimeDelta::days(window_days);
        let records = self.read();
        let in_window: Vec<&UsageRecord> = records
            .iter()
            .filter(|r| r.timestamp > since && r.timestamp <= now)
            .filter(|r| family.is_none_or(|f| r.family == f))
            .collect();

        let total = in_window.len();
        let successes: Vec<&&UsageRecord> = in_window.iter().filter(|r| r.success).collect();
        let validation_failures = successes.iter().filter(|r| !r.validation_passed).count();
        let corrected = successes.iter().filter(|r| r.auto_corrected).count();
        let total_ms: u128 = in_window.iter().map(|r| r.duration.as_millis()).sum();

        let mut error_kinds = BTreeMap::new();
        for kind in in_window.iter().filter_map(|r| r.error_kind.as_ref()) {
            *error_kinds.entry(kind.clone()).or_insert(0) += 1;
        }

        MetricsSummary {
            window_days,
            family,
            total,
            successes: successes.len(),
            success_rate: ratio(successes.len(), total),
            validation_failure_rate: ratio(validation_failures, successes.len()),
            auto_correction_rate: ratio(corrected, successes.len()),
            avg_duration_ms: if total == 0 {
                0.0
            } else {
                total_ms as f64 / total as f64
            },
            error_kinds,
        }
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

impl MetricsSummary {
    /// Format summary for display
    pub fn display(&self) -> String {
        let scope = self
            .family
            .map(|f| f.to_string())
            .unwrap_or_else(|| "all families".to_string());
        format!(
            "Scope: {} (last {} days)\n\
             Generations: {} ({} succeeded, {:.1}%)\n\
             Validation failures: {:.1}%\n\
             Auto-corrected: {:.1}%\n\
             Avg Duration: {:.0}ms",
            scope,
            self.window_days,
            self.total,
            self.successes,
            self.success_rate * 100.0,
            self.validation_failure_rate * 100.0,
            self.auto_correction_rate * 100.0,
            self.avg_duration_ms
        )
    }
}

// =============================================================================
// Shared Type
// =============================================================================

/// Shared metrics recorder for concurrent runs
pub type SharedMetrics = Arc<MetricsRecorder>;

// =============================================================================
// Tests
// =============================================================================
