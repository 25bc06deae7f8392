//! puzzleforge - AI-Assisted Puzzle Generation and Verification
//!
//! Generates logic puzzles and math exercises with a streaming LLM backend,
//! repairs malformed model output, verifies answers algorithmically and
//! corrects them where the puzzle data determines the answer.
//!
//! ## Core Features
//!
//! - **Streaming Orchestrator**: progress events over a `Stream`, bounded retry, reasoning-tier fallback
//! - **JSON Repair**: recovers truncated or decorated model output
//! - **Logical Validation**: per-family consistency rules with auto-correction
//! - **Quotas**: per-caller hourly and daily sliding windows
//! - **Usage Accounting**: success/correction metrics and per-backend cost
//!
//! ## Quick Start
//!
//! ```ignore
//! use puzzleforge::{GenerationRequest, GenerationServices, Orchestrator};
//!
//! let orchestrator = Orchestrator::new(services, Arc::new(config));
//! let mut events = pin!(orchestrator.generate(GenerationRequest::new("sequence", "beginner", "u1")));
//! while let Some(event) = events.next().await {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`generation`]: the orchestrator and its events
//! - [`puzzle`]: families, candidates, validator, corrector, difficulty policy
//! - [`ai`]: backend abstraction, JSON repair, metrics and cost tracking
//! - [`quota`]: per-caller rate limiter
//! - [`storage`]: content stores (in-memory, SQLite)
//! - [`config`]: layered configuration

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod generation;
pub mod puzzle;
pub mod quota;
pub mod storage;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{ErrorCategory, ForgeError, LlmError, Result};

// Storage
pub use storage::{ContentStore, InMemoryContentStore, SqliteContentStore};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use generation::{
    GeneratedArtifact, GenerationRequest, GenerationServices, Orchestrator, ProgressEvent,
};
pub use puzzle::{AutoCorrector, Candidate, Family, LogicValidator, ValidationResult};
pub use quota::{QuotaDecision, RateLimiter};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    CostTracker, GenerationBackend, JsonRepairer, MetricsRecorder, OpenAiCompatibleBackend,
    UsageRecord,
};
