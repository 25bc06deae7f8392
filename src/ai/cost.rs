//! Cost Tracking
//!
//! Converts token usage into money using per-backend prices (per 1K
//! tokens) and keeps an append-only log, aggregated per family and per UTC
//! calendar day. Unknown backends fall back to the default price row.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::provider::TokenUsage;
use crate::constants::pricing;
use crate::puzzle::Family;

// =============================================================================
// Prices
// =============================================================================

/// Price per 1K tokens (USD)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64,
}

impl Default for Price {
    fn default() -> Self {
        Self {
            prompt_per_1k: pricing::DEFAULT_PROMPT_PER_1K,
            completion_per_1k: pricing::DEFAULT_COMPLETION_PER_1K,
        }
    }
}

impl Price {
    pub fn cost(&self, usage: &TokenUsage) -> f64 {
        (usage.input_tokens as f64 / 1000.0) * self.prompt_per_1k
            + (usage.output_tokens as f64 / 1000.0) * self.completion_per_1k
    }
}

/// Per-backend prices with a default row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceTable {
    pub default: Price,
    pub backends: HashMap<String, Price>,
}

impl Default for PriceTable {
    fn default() -> Self {
        let mut backends = HashMap::new();
        backends.insert(
            "gpt-4o-mini".to_string(),
            Price {
                prompt_per_1k: 0.00015,
                completion_per_1k: 0.0006,
            },
        );
        backends.insert(
            "o4-mini".to_string(),
            Price {
                prompt_per_1k: 0.0011,
                completion_per_1k: 0.0044,
            },
        );
        Self {
            default: Price::default(),
            backends,
        }
    }
}

impl PriceTable {
    pub fn price_for(&self, backend_id: &str) -> Price {
        self.backends.get(backend_id).copied().unwrap_or(self.default)
    }

    pub fn validate(&self) -> Result<(), String> {
        let rows = std::iter::once(("default", &self.default))
            .chain(self.backends.iter().map(|(k, v)| (k.as_str(), v)));
        for (name, price) in rows {
            if price.prompt_per_1k < 0.0 || price.completion_per_1k < 0.0 {
                return Err(format!("pricing for '{}' must not be negative", name));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Cost Records
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    pub timestamp: DateTime<Utc>,
    pub family: Family,
    pub prompt_units: u32,
    pub completion_units: u32,
    pub cost: f64,
    pub backend_id: String,
}

/// Sum of cost records
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CostTotals {
    pub requests: usize,
    pub prompt_units: u64,
    pub completion_units: u64,
    pub cost: f64,
}

impl CostTotals {
    fn add(&mut self, record: &CostRecord) {
        self.requests += 1;
        self.prompt_units += record.prompt_units as u64;
        self.completion_units += record.completion_units as u64;
        self.cost += record.cost;
    }
}

/// Thread-safe cost log
#[derive(Default)]
pub struct CostTracker {
    prices: PriceTable,
    records: RwLock<Vec<CostRecord>>,
}

impl CostTracker {
    pub fn new(prices: PriceTable) -> Self {
        Self {
            prices,
            records: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<CostRecord>> {
        self.records.read().unwrap_or_else(|poisoned| {
            tracing::error!("Cost records RwLock poisoned on read, recovering");
            poisoned.into_inner()
        })
    }

    pub fn record(&self, family: Family, backend_id: &str, usage: &TokenUsage) -> CostRecord {
        self.record_at(Utc::now(), family, backend_id, usage)
    }

    pub fn record_at(
        &self,
        timestamp: DateTime<Utc>,
        family: Family,
        backend_id: &str,
        usage: &TokenUsage,
    ) -> CostRecord {
        let record = CostRecord {
            timestamp,
            family,
            prompt_units: usage.input_tokens,
            completion_units: usage.output_tokens,
            cost: self.prices.price_for(backend_id).cost(usage),
            backend_id: backend_id.to_string(),
        };

        let mut records = self.records.write().unwrap_or_else(|poisoned| {
            tracing::error!("Cost records RwLock poisoned, recovering");
            poisoned.into_inner()
        });
        records.push(record.clone());
        record
    }

    pub fn total(&self) -> CostTotals {
        let mut totals = CostTotals::default();
        for record in self.read().iter() {
            totals.add(record);
        }
        totals
    }

    pub fn by_family(&self) -> BTreeMap<Family, CostTotals> {
        let mut grouped: BTreeMap<Family, CostTotals> = BTreeMap::new();
        for record in self.read().iter() {
            grouped.entry(record.family).or_default().add(record);
        }
        grouped
    }

    /// Totals per UTC calendar day
    pub fn by_day(&self) -> BTreeMap<NaiveDate, CostTotals> {
        let mut grouped: BTreeMap<NaiveDate, CostTotals> = BTreeMap::new();
        for record in self.read().iter() {
            grouped
                .entry(record.timestamp.date_naive())
                .or_default()
                .add(record);
        }
        grouped
    }

    pub fn records(&self) -> Vec<CostRecord> {
        self.read().clone()
    }
}

/// Shared cost tracker for concurrent runs
pub type SharedCostTracker = Arc<CostTracker>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn table() -> PriceTable {
        let mut backends = HashMap::new();
        backends.insert(
            "cheap".to_string(),
            Price {
                prompt_per_1k: 0.001,
                completion_per_1k: 0.002,
            },
        );
        PriceTable {
            default: Price {
                prompt_per_1k: 0.01,
                completion_per_1k: 0.03,
            },
            backends,
        }
    }

    #[test]
    fn test_known_and_default_prices() {
        let tracker = CostTracker::new(table());
        let known = tracker.record(Family::Pattern, "cheap", &TokenUsage::new(1000, 500));
        assert!((known.cost - 0.002).abs() < 1e-12);

        let unknown = tracker.record(Family::Pattern, "mystery", &TokenUsage::new(1000, 1000));
        assert!((unknown.cost - 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_aggregates_by_family_and_day() {
        let tracker = CostTracker::new(table());
        let day1 = Utc.with_ymd_and_hms(2025, 3, 1, 23, 59, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2025, 3, 2, 0, 1, 0).unwrap();

        tracker.record_at(day1, Family::Pattern, "cheap", &TokenUsage::new(100, 100));
        tracker.record_at(day2, Family::Pattern, "cheap", &TokenUsage::new(100, 100));
        tracker.record_at(day2, Family::Graph, "cheap", &TokenUsage::new(50, 10));

        let by_family = tracker.by_family();
        assert_eq!(by_family[&Family::Pattern].requests, 2);
        assert_eq!(by_family[&Family::Graph].prompt_units, 50);

        let by_day = tracker.by_day();
        assert_eq!(by_day.len(), 2);
        assert_eq!(by_day[&day2.date_naive()].requests, 2);

        let total = tracker.total();
        assert_eq!(total.requests, 3);
        assert_eq!(total.completion_units, 210);
    }

    #[test]
    fn test_price_validation() {
        assert!(PriceTable::default().validate().is_ok());
        let mut bad = PriceTable::default();
        bad.default.prompt_per_1k = -1.0;
        assert!(bad.validate().is_err());
    }
}
