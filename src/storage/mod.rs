//! Content persistence
//!
//! - `content_store`: the write-only `ContentStore` seam and an in-memory store
//! - `database`: SQLite store with r2d2 pooling

pub mod content_store;
pub mod database;

pub use content_store::{
    ContentStore, InMemoryContentStore, NewContent, SharedContentStore, StoredContent,
    estimate_minutes,
};
pub use database::{PoolConfig, SharedSqliteStore, SqliteContentStore};
