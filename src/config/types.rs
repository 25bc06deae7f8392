//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/puzzleforge/) and project (.puzzleforge/) level configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ai::{BackendParams, PriceTable, RetryPolicy};
use crate::constants::{backend, hint, metrics, network, storage};
use crate::puzzle::{DifficultyPolicy, Family};
use crate::quota::QuotaLimits;
use crate::types::{ForgeError, Result};

/// Key of the row used by families without their own entry
pub const DEFAULT_ROW: &str = "default";

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Backend endpoint settings
    pub llm: LlmConfig,

    /// Orchestrator settings
    pub generation: GenerationConfig,

    /// Per-caller limits
    pub quota: QuotaLimits,

    /// Difficulty normalization policy
    pub difficulty: DifficultyPolicy,

    /// Per-backend prices
    pub pricing: PriceTable,

    pub metrics: MetricsConfig,

    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: LlmConfig::default(),
            generation: GenerationConfig::default(),
            quota: QuotaLimits::default(),
            difficulty: DifficultyPolicy::default(),
            pricing: PriceTable::default(),
            metrics: MetricsConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `ForgeError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            self.llm.validate(),
            self.generation.validate(),
            self.quota.validate(),
            self.difficulty.validate(),
            self.pricing.validate(),
            self.metrics.validate(),
        ];
        for check in checks {
            check.map_err(ForgeError::Config)?;
        }
        Ok(())
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible endpoint
    pub api_base: String,

    /// Inline API key; prefer `api_key_env`. Never written back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// TCP/TLS connect timeout (seconds)
    pub connect_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: network::DEFAULT_API_BASE.to_string(),
            api_key: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            connect_timeout_secs: network::CONNECTION_TIMEOUT_SECS,
        }
    }
}

impl LlmConfig {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.api_base.trim().is_empty() {
            return Err("llm.api_base must not be empty".to_string());
        }
        if self.connect_timeout_secs == 0 {
            return Err("llm.connect_timeout_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Generation Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Characters kept from a caller hint
    pub hint_max_chars: usize,

    /// Retry budget for one streaming call
    pub retry: RetryPolicy,

    /// Backend parameters per family name, with a `default` row
    pub families: BTreeMap<String, BackendParams>,

    /// Parameters for the single non-streaming fallback call
    pub fallback: BackendParams,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        let mut families = BTreeMap::new();
        families.insert(DEFAULT_ROW.to_string(), BackendParams::general());
        // Grid inference benefits from multi-step reasoning
        families.insert(Family::Pattern.to_string(), BackendParams::reasoning());
        families.insert(Family::Spatial.to_string(), BackendParams::reasoning());

        Self {
            hint_max_chars: hint::MAX_CHARS,
            retry: RetryPolicy::default(),
            families,
            fallback: BackendParams::general(),
        }
    }
}

impl GenerationConfig {
    /// Row for `family`, else the default row
    pub fn params_for(&self, family: Family) -> BackendParams {
        self.families
            .get(family.as_str())
            .or_else(|| self.families.get(DEFAULT_ROW))
            .cloned()
            .unwrap_or_else(BackendParams::general)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.hint_max_chars == 0 {
            return Err("generation.hint_max_chars must be greater than 0".to_string());
        }
        self.retry.validate()?;

        for (name, params) in &self.families {
            if name != DEFAULT_ROW && name.parse::<Family>().is_err() {
                return Err(format!("generation.families.{}: unknown family", name));
            }
            validate_params(&format!("generation.families.{}", name), params)?;
        }
        validate_params("generation.fallback", &self.fallback)
    }
}

fn validate_params(path: &str, params: &BackendParams) -> std::result::Result<(), String> {
    if params.model.trim().is_empty() {
        return Err(format!("{}.model must not be empty", path));
    }
    if !(0.0..=2.0).contains(&params.temperature) {
        return Err(format!(
            "{}.temperature must be between 0.0 and 2.0, got {}",
            path, params.temperature
        ));
    }
    if params.max_tokens == 0 {
        return Err(format!("{}.max_tokens must be greater than 0", path));
    }
    if params.timeout_secs == 0 {
        return Err(format!("{}.timeout_secs must be greater than 0", path));
    }
    Ok(())
}

// =============================================================================
// Metrics & Storage
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Trailing window used by summaries (days)
    pub window_days: i64,

    /// Records older than this are dropped (days)
    pub retention_days: i64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            window_days: metrics::WINDOW_DAYS,
            retention_days: metrics::RETENTION_DAYS,
        }
    }
}

impl MetricsConfig {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.window_days <= 0 {
            return Err("metrics.window_days must be greater than 0".to_string());
        }
        if self.retention_days < self.window_days {
            return Err("metrics.retention_days must cover metrics.window_days".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    /// Process-local, lost on exit
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// SQLite file, relative to the working directory
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            path: PathBuf::from(storage::DEFAULT_DATABASE),
        }
    }
}
