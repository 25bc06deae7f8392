//! SQLite Content Store with Connection Pooling
//!
//! - Connection pooling via r2d2 for concurrent access
//! - WAL mode for concurrent readers while runs are writing
//! - Version-tracked schema
//! - Blocking SQLite work moved off the async runtime with `spawn_blocking`

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, params};

use super::content_store::{ContentStore, NewContent, StoredContent};
use crate::types::{ForgeError, Result};

/// Shared store handle for async contexts.
pub type SharedSqliteStore = Arc<SqliteContentStore>;

/// Current schema version for migration tracking
const SCHEMA_VERSION: u32 = 1;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS contents (
    id TEXT PRIMARY KEY,
    family TEXT NOT NULL,
    audience_tier TEXT NOT NULL,
    caller_id TEXT NOT NULL,
    title TEXT NOT NULL CHECK (length(title) > 0),
    question TEXT NOT NULL CHECK (length(question) > 0),
    correct_answer TEXT NOT NULL,
    explanation TEXT NOT NULL,
    hints TEXT NOT NULL,
    family_data TEXT NOT NULL,
    difficulty REAL NOT NULL,
    estimated_time_minutes INTEGER NOT NULL,
    tags TEXT NOT NULL,
    auto_corrected INTEGER NOT NULL,
    validation_passed INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_contents_family ON contents(family);
CREATE INDEX IF NOT EXISTS idx_contents_created_at ON contents(created_at);
"#;

/// Connection pool configuration
///
/// Pool size is dynamically calculated based on CPU cores.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,
    /// Minimum idle connections to keep ready
    pub min_idle: u32,
    /// Timeout for acquiring a connection (seconds)
    pub connection_timeout_secs: u64,
}

impl PoolConfig {
    const MIN_POOL_SIZE: u32 = 2;
    const MAX_POOL_SIZE: u32 = 16;

    /// Formula: clamp(cores, MIN, MAX)
    pub fn optimal_pool_size() -> u32 {
        let cores = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);
        cores.clamp(Self::MIN_POOL_SIZE, Self::MAX_POOL_SIZE)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        let max_size = Self::optimal_pool_size();
        Self {
            max_size,
            min_idle: (max_size / 4).max(1),
            connection_timeout_secs: 30,
        }
    }
}

/// Thread-safe SQLite content store.
pub struct SqliteContentStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteContentStore {
    /// Open (creating if needed) the store at `path` and apply the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, PoolConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: PoolConfig) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let manager =
            SqliteConnectionManager::file(path.as_ref()).with_init(Self::configure_connection);

        let pool = Pool::builder()
            .max_size(config.max_size)
            .min_idle(Some(config.min_idle))
            .connection_timeout(std::time::Duration::from_secs(
                config.connection_timeout_secs,
            ))
            .build(manager)
            .map_err(|e| ForgeError::Storage(format!("Failed to create connection pool: {}", e)))?;

        let store = Self { pool };
        store.initialize()?;
        Ok(store)
    }

    /// Open an in-memory store for testing or dry runs.
    pub fn open_in_memory() -> Result<Self> {
        // Every in-memory connection is its own database, so keep exactly one
        let pool = Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::memory())
            .map_err(|e| ForgeError::Storage(format!("Failed to create in-memory pool: {}", e)))?;

        let store = Self { pool };
        store.initialize()?;
        Ok(store)
    }

    fn configure_connection(conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            "#,
        )
    }

    fn conn(pool: &Pool<SqliteConnectionManager>) -> Result<PooledConnection<SqliteConnectionManager>> {
        pool.get().map_err(|e| {
            ForgeError::Storage(format!("Failed to acquire database connection: {}", e))
        })
    }

    fn initialize(&self) -> Result<()> {
        let conn = Self::conn(&self.pool)?;
        let current_version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        conn.execute_batch(SCHEMA)?;
        if current_version < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            tracing::info!(version = SCHEMA_VERSION, "Initialized content schema");
        }
        Ok(())
    }

    fn insert(pool: &Pool<SqliteConnectionManager>, content: &NewContent) -> Result<StoredContent> {
        let stored = StoredContent::fresh();
        let conn = Self::conn(pool)?;

        conn.execute(
            "INSERT INTO contents
             (id, family, audience_tier, caller_id, title, question, correct_answer,
              explanation, hints, family_data, difficulty, estimated_time_minutes, tags,
              auto_corrected, validation_passed, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                stored.id,
                content.family.as_str(),
                content.audience_tier.as_str(),
                content.caller_id.as_str(),
                content.title,
                content.question,
                content.correct_answer,
                content.explanation,
                serde_json::to_string(&content.hints)?,
                serde_json::to_string(&content.family_data)?,
                content.difficulty,
                content.estimated_time_minutes,
                serde_json::to_string(&content.tags)?,
                content.auto_corrected,
                content.validation_passed,
                stored.created_at.to_rfc3339(),
            ],
        )?;

        tracing::debug!(id = %stored.id, family = %content.family, "Stored content");
        Ok(stored)
    }

    /// Number of stored items
    pub fn count(&self) -> Result<usize> {
        let conn = Self::conn(&self.pool)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM contents", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Load a stored item back
    pub fn load(&self, id: &str) -> Result<Option<(StoredContent, NewContent)>> {
        let conn = Self::conn(&self.pool)?;
        let row = conn
            .query_row(
                "SELECT family, audience_tier, caller_id, title, question, correct_answer,
                        explanation, hints, family_data, difficulty, estimated_time_minutes,
                        tags, auto_corrected, validation_passed, created_at
                 FROM contents WHERE id = ?1",
                params![id],
                |row| {
                    Ok(ContentRow {
                        family: row.get(0)?,
                        audience_tier: row.get(1)?,
                        caller_id: row.get(2)?,
                        title: row.get(3)?,
                        question: row.get(4)?,
                        correct_answer: row.get(5)?,
                        explanation: row.get(6)?,
                        hints: row.get(7)?,
                        family_data: row.get(8)?,
                        difficulty: row.get(9)?,
                        estimated_time_minutes: row.get(10)?,
                        tags: row.get(11)?,
                        auto_corrected: row.get(12)?,
                        validation_passed: row.get(13)?,
                        created_at: row.get(14)?,
                    })
                },
            )
            .optional()?;

        row.map(|row| row.into_content(id)).transpose()
    }
}

struct ContentRow {
    family: String,
    audience_tier: String,
    caller_id: String,
    title: String,
    question: String,
    correct_answer: String,
    explanation: String,
    hints: String,
    family_data: String,
    difficulty: f64,
    estimated_time_minutes: u32,
    tags: String,
    auto_corrected: bool,
    validation_passed: bool,
    created_at: String,
}

impl ContentRow {
    fn into_content(self, id: &str) -> Result<(StoredContent, NewContent)> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| ForgeError::Storage(format!("Bad created_at for {}: {}", id, e)))?;

        let content = NewContent {
            family: self.family.parse().map_err(ForgeError::Storage)?,
            audience_tier: self.audience_tier.parse().map_err(ForgeError::Storage)?,
            caller_id: self.caller_id.into(),
            title: self.title,
            question: self.question,
            correct_answer: self.correct_answer,
            explanation: self.explanation,
            hints: serde_json::from_str(&self.hints)?,
            family_data: serde_json::from_str(&self.family_data)?,
            difficulty: self.difficulty,
            estimated_time_minutes: self.estimated_time_minutes,
            tags: serde_json::from_str(&self.tags)?,
            auto_corrected: self.auto_corrected,
            validation_passed: self.validation_passed,
        };

        Ok((
            StoredContent {
                id: id.to_string(),
                created_at,
            },
            content,
        ))
    }
}

#[async_trait]
impl ContentStore for SqliteContentStore {
    async fn create(&self, content: NewContent) -> Result<StoredContent> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || Self::insert(&pool, &content))
            .await
            .map_err(|e| ForgeError::Internal(format!("Storage task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puzzle::{AudienceTier, Family, FamilyData};
    use crate::types::CallerId;
    use tempfile::TempDir;

    fn content() -> NewContent {
        NewContent {
            family: Family::Graph,
            audience_tier: AudienceTier::Advanced,
            caller_id: CallerId::new("tester"),
            title: "Bridges".to_string(),
            question: "Which node has the most edges?".to_string(),
            correct_answer: "B".to_string(),
            explanation: "B touches every other node.".to_string(),
            hints: vec!["Count the lines".to_string()],
            family_data: FamilyData::Graph {
                nodes: vec!["A".into(), "B".into(), "C".into()],
                edges: vec![("A".into(), "B".into()), ("B".into(), "C".into())],
            },
            difficulty: 3.5,
            estimated_time_minutes: 9,
            tags: vec!["graph".to_string(), "advanced".to_string()],
            auto_corrected: false,
            validation_passed: true,
        }
    }

    #[tokio::test]
    async fn test_create_and_load_round_trip() {
        let store = SqliteContentStore::open_in_memory().unwrap();
        let original = content();
        let stored = store.create(original.clone()).await.unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let (loaded_id, loaded) = store.load(&stored.id).unwrap().unwrap();
        assert_eq!(loaded_id.id, stored.id);
        assert_eq!(loaded, original);
        assert!(store.load("nope").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("content.db");
        let store = SqliteContentStore::open(&path).unwrap();
        store.create(content()).await.unwrap();
        assert!(path.exists());

        drop(store);
        let reopened = SqliteContentStore::open(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_title_rejected_by_schema() {
        let store = SqliteContentStore::open_in_memory().unwrap();
        let mut bad = content();
        bad.title.clear();
        assert!(store.create(bad).await.is_err());
        assert_eq!(store.count().unwrap(), 0);
    }
}
