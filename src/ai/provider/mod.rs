//! Generation Backend Abstraction
//!
//! Defines the `GenerationBackend` trait used by the orchestrator. A backend
//! can stream fragments of a completion or return it in one piece.
//!
//! ## Modules
//!
//! - `openai`: OpenAI-compatible Chat Completions client with SSE streaming
//! - `retry`: bounded exponential retry for transient failures

mod openai;
mod retry;

pub use openai::OpenAiCompatibleBackend;
pub use retry::{AttemptOutcome, RetryPolicy, run_with_retry};

// Re-export error types from centralized location
pub use crate::types::{ErrorCategory, ErrorClassifier, LlmError};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::constants::backend;
use crate::types::Result;

// =============================================================================
// Request Parameters
// =============================================================================

/// Backend class a family is routed to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendTier {
    /// General-purpose model
    #[default]
    Standard,
    /// Reasoning model; may return an empty stream, which triggers a
    /// non-streaming fallback to the standard tier
    Reasoning,
}

/// Per-family call parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub tier: BackendTier,
}

impl Default for BackendParams {
    fn default() -> Self {
        Self::general()
    }
}

impl BackendParams {
    /// General-purpose row, also used for fallback calls
    pub fn general() -> Self {
        Self {
            model: backend::GENERAL_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: backend::MAX_TOKENS,
            timeout_secs: backend::TIMEOUT_SECS,
            tier: BackendTier::Standard,
        }
    }

    pub fn reasoning() -> Self {
        Self {
            model: backend::REASONING_MODEL.to_string(),
            temperature: 1.0,
            max_tokens: backend::MAX_TOKENS * 2,
            timeout_secs: backend::REASONING_TIMEOUT_SECS,
            tier: BackendTier::Reasoning,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn is_reasoning(&self) -> bool {
        self.tier == BackendTier::Reasoning
    }
}

/// System + user instruction pair with call parameters
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub system: String,
    pub user: String,
    pub params: BackendParams,
}

impl BackendRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>, params: BackendParams) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            params,
        }
    }

    /// Same instructions routed to different parameters
    pub fn with_params(&self, params: BackendParams) -> Self {
        Self {
            system: self.system.clone(),
            user: self.user.clone(),
            params,
        }
    }
}

// =============================================================================
// Responses
// =============================================================================

/// Token usage reported by a backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens (prompt)
    pub input_tokens: u32,
    /// Output tokens (completion)
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Total tokens used (input + output)
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// One item of a streamed completion
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Text fragment to append
    Text(String),
    /// Usage metadata, usually sent once at the end
    Usage(TokenUsage),
}

pub type FragmentStream = BoxStream<'static, Result<StreamChunk>>;

/// Non-streaming completion
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

// =============================================================================
// Backend Trait
// =============================================================================

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Start a streaming completion
    async fn stream(&self, request: &BackendRequest) -> Result<FragmentStream>;

    /// Run a completion to the end and return it whole
    async fn complete(&self, request: &BackendRequest) -> Result<Completion>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Shared backend for concurrent runs
pub type SharedBackend = Arc<dyn GenerationBackend>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_rows() {
        let general = BackendParams::general();
        assert!(!general.is_reasoning());
        assert_eq!(general.timeout(), Duration::from_secs(backend::TIMEOUT_SECS));

        let reasoning = BackendParams::reasoning();
        assert!(reasoning.is_reasoning());
        assert!(reasoning.timeout() > general.timeout());
    }

    #[test]
    fn test_params_partial_deserialize() {
        let params: BackendParams =
            serde_json::from_str(r#"{"model": "o4-mini", "tier": "reasoning"}"#).unwrap();
        assert_eq!(params.model, "o4-mini");
        assert_eq!(params.tier, BackendTier::Reasoning);
        assert_eq!(params.max_tokens, backend::MAX_TOKENS);
    }

    #[test]
    fn test_token_usage_total() {
        assert_eq!(TokenUsage::new(100, 50).total(), 150);
    }
}
