//! AI Integration Layer
//!
//! Backend access, output repair, token estimation and usage accounting
//! for puzzle generation.

pub mod cost;
pub mod metrics;
pub mod prompt;
pub mod provider;
pub mod timeout;
pub mod tokenizer;
pub mod validation;

pub use cost::{CostRecord, CostTotals, CostTracker, Price, PriceTable, SharedCostTracker};
pub use metrics::{MetricsRecorder, MetricsSummary, SharedMetrics, UsageRecord};
pub use prompt::{PromptBuilder, PromptSection};
pub use provider::{
    AttemptOutcome, BackendParams, BackendRequest, BackendTier, Completion, ErrorCategory,
    ErrorClassifier, FragmentStream, GenerationBackend, LlmError, OpenAiCompatibleBackend,
    RetryPolicy, SharedBackend, StreamChunk, TokenUsage, run_with_retry,
};
pub use timeout::with_timeout;
pub use tokenizer::{estimate_tokens, estimate_usage};
pub use validation::{JsonRepairer, extract_json_from_response, extract_json_with_repair_status};
