//! Generate Command
//!
//! Runs one generation against the configured backend and prints its
//! progress events.
//!
//! Usage:
//!   puzzleforge generate --family pattern --tier beginner [--hint TEXT] [--json]

use std::path::PathBuf;
use std::pin::pin;
use std::sync::Arc;

use futures::StreamExt;
use tracing::debug;

use crate::ai::{CostTracker, MetricsRecorder, OpenAiCompatibleBackend, SharedBackend};
use crate::cli::ui::Output;
use crate::config::{Config, ConfigLoader, StorageBackend, StorageConfig};
use crate::generation::{GenerationRequest, GenerationServices, Orchestrator, ProgressEvent};
use crate::quota::RateLimiter;
use crate::storage::{InMemoryContentStore, SharedContentStore, SqliteContentStore};
use crate::types::Result;

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub family: String,
    pub tier: String,
    pub hint: Option<String>,
    pub caller: String,
    /// JSON lines instead of styled output
    pub json: bool,
    /// Keep the result in memory only
    pub no_save: bool,
    /// Config file replacing the global/project chain
    pub config: Option<PathBuf>,
}

/// Returns whether the run ended in `done`
pub async fn run(options: GenerateOptions) -> Result<bool> {
    let mut config = match &options.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    if options.no_save {
        config.storage.backend = StorageBackend::Memory;
    }

    let orchestrator = build_orchestrator(config)?;
    let output = if options.json {
        Output::json_lines()
    } else {
        Output::new()
    };

    let request = GenerationRequest {
        family: options.family,
        audience_tier: options.tier,
        hint: options.hint,
        caller_id: options.caller,
    };

    let mut events = pin!(orchestrator.generate(request));
    let mut succeeded = false;
    while let Some(event) = events.next().await {
        output.event(&event)?;
        if matches!(event, ProgressEvent::Done { .. }) {
            succeeded = true;
        }
    }
    Ok(succeeded)
}

fn build_orchestrator(config: Config) -> Result<Orchestrator> {
    let backend: SharedBackend = Arc::new(OpenAiCompatibleBackend::new(&config.llm)?);
    let store = open_store(&config.storage)?;
    debug!(backend = ?config.storage.backend, "Opened content store");

    let services = GenerationServices {
        backend,
        store,
        limiter: Arc::new(RateLimiter::new()),
        metrics: Arc::new(MetricsRecorder::new(config.metrics.retention_days)),
        costs: Arc::new(CostTracker::new(config.pricing.clone())),
    };
    Ok(Orchestrator::new(services, Arc::new(config)))
}

fn open_store(storage: &StorageConfig) -> Result<SharedContentStore> {
    let store: SharedContentStore = match storage.backend {
        StorageBackend::Sqlite => Arc::new(SqliteContentStore::open(&storage.path)?),
        StorageBackend::Memory => Arc::new(InMemoryContentStore::new()),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_store_per_backend() {
        let dir = TempDir::new().unwrap();
        let sqlite = StorageConfig {
            backend: StorageBackend::Sqlite,
            path: dir.path().join("content.db"),
        };
        assert!(open_store(&sqlite).is_ok());
        assert!(dir.path().join("content.db").exists());

        let memory = StorageConfig {
            backend: StorageBackend::Memory,
            path: dir.path().join("unused.db"),
        };
        assert!(open_store(&memory).is_ok());
        assert!(!dir.path().join("unused.db").exists());
    }

    #[test]
    fn test_missing_api_key_fails_before_any_run() {
        let mut config = Config::default();
        config.llm.api_key_env = "PUZZLEFORGE_TEST_UNSET_KEY".to_string();
        assert!(build_orchestrator(config).is_err());
    }
}
