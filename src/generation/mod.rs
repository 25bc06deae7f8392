//! Generation Orchestrator
//!
//! Drives one request from raw input to a stored artifact:
//!
//! ```text
//! input check → quota → hint sanitize → backend params
//!   → stream (bounded retry) → [reasoning tier: one fallback on empty output]
//!   → JSON repair → required fields → validate → [auto-correct → re-validate]
//!   → difficulty normalize → persist → cost + usage record → artifact, done
//! ```
//!
//! Each run is a tokio task feeding a bounded channel; the caller consumes it
//! as a `Stream` of [`ProgressEvent`]s. Every run ends with exactly one
//! terminal event. Rejections (bad input, quota) leave no usage record;
//! everything that fails after the backend was reached leaves exactly one.
//!
//! ## Cancellation
//!
//! Dropping the stream before the backend call stops the run quietly. After
//! that point the run finishes (persistence included) and further events are
//! discarded.

mod events;
mod prompts;
mod sanitize;

pub use events::{GeneratedArtifact, ProgressEvent, Stage};
pub use prompts::{system_prompt, user_prompt};
pub use sanitize::sanitize_hint;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::{FutureExt, Stream, StreamExt, stream};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

use crate::ai::{
    AttemptOutcome, BackendRequest, GenerationBackend, JsonRepairer, SharedBackend,
    SharedCostTracker, SharedMetrics, StreamChunk, TokenUsage, UsageRecord, estimate_usage,
    run_with_retry, with_timeout,
};
use crate::config::Config;
use crate::constants::backend::EVENT_BUFFER;
use crate::puzzle::{AudienceTier, AutoCorrector, Candidate, Family, LogicValidator};
use crate::quota::RateLimiter;
use crate::storage::{NewContent, SharedContentStore};
use crate::types::{CallerId, ForgeError, Result};
use events::EventSink;

/// Validation errors quoted in the unresolved-validation warning
const WARNED_ERRORS: usize = 2;

// =============================================================================
// Request & Services
// =============================================================================

/// Raw request as received from a surface; parsed in the first stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub family: String,
    pub audience_tier: String,
    #[serde(default)]
    pub hint: Option<String>,
    pub caller_id: String,
}

impl GenerationRequest {
    pub fn new(
        family: impl Into<String>,
        audience_tier: impl Into<String>,
        caller_id: impl Into<String>,
    ) -> Self {
        Self {
            family: family.into(),
            audience_tier: audience_tier.into(),
            hint: None,
            caller_id: caller_id.into(),
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    fn parse(&self) -> Result<(Family, AudienceTier, CallerId)> {
        let family = self.family.parse().map_err(ForgeError::InvalidInput)?;
        let tier = self.audience_tier.parse().map_err(ForgeError::InvalidInput)?;
        let caller = self.caller_id.trim();
        if caller.is_empty() {
            return Err(ForgeError::InvalidInput("caller_id is required".to_string()));
        }
        Ok((family, tier, CallerId::new(caller)))
    }
}

/// Process-wide collaborators shared by every run
#[derive(Clone)]
pub struct GenerationServices {
    pub backend: SharedBackend,
    pub store: SharedContentStore,
    pub limiter: Arc<RateLimiter>,
    pub metrics: SharedMetrics,
    pub costs: SharedCostTracker,
}

/// Text and usage produced by the backend stage
struct BackendOutput {
    text: String,
    usage: TokenUsage,
    backend_id: String,
}

// =============================================================================
// Orchestrator
// =============================================================================

#[derive(Clone)]
pub struct Orchestrator {
    services: GenerationServices,
    config: Arc<Config>,
}

impl Orchestrator {
    pub fn new(services: GenerationServices, config: Arc<Config>) -> Self {
        Self { services, config }
    }

    /// Start a run and return its event stream.
    ///
    /// Must be called from within a tokio runtime. The stream is single-pass
    /// and ends after the terminal event.
    pub fn generate(
        &self,
        request: GenerationRequest,
    ) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let sink = EventSink::new(tx);
        let this = self.clone();
        let span = info_span!(
            "generation",
            family = %request.family,
            caller = %request.caller_id
        );

        tokio::spawn(async move { this.run_guarded(request, sink).await }.instrument(span));

        stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
    }

    /// Outer boundary: every error and panic ends here as one `error` event
    async fn run_guarded(&self, request: GenerationRequest, sink: EventSink) {
        let started = Instant::now();
        let outcome = AssertUnwindSafe(self.run(&request, &sink, started))
            .catch_unwind()
            .await;

        let (kind, message, recordable) = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(err)) => {
                let recordable = !err.is_rejection();
                if recordable {
                    error!(kind = err.kind(), error = %err, "Generation failed");
                } else {
                    info!(kind = err.kind(), error = %err, "Generation rejected");
                }
                (err.kind().to_string(), public_message(&err), recordable)
            }
            Err(payload) => {
                error!(panic = %panic_message(payload.as_ref()), "Generation panicked");
                (
                    "panic".to_string(),
                    "Internal error during generation".to_string(),
                    true,
                )
            }
        };

        if recordable && let Ok(family) = request.family.parse::<Family>() {
            self.services
                .metrics
                .record(UsageRecord::failure(family, started.elapsed(), kind.clone()));
        }

        sink.emit(ProgressEvent::Error { kind, message }).await;
    }

    #[instrument(skip_all)]
    async fn run(
        &self,
        request: &GenerationRequest,
        sink: &EventSink,
        started: Instant,
    ) -> Result<()> {
        let (family, tier, caller) = request.parse()?;

        let limits = self.config.quota;
        let decision = self
            .services
            .limiter
            .check(&caller, limits.per_hour, limits.per_day);
        if !decision.allowed {
            return Err(ForgeError::QuotaExceeded {
                reason: decision.reason.unwrap_or_else(|| "quota exceeded".to_string()),
            });
        }

        let generation = &self.config.generation;
        let hint = sanitize_hint(request.hint.as_deref(), generation.hint_max_chars);
        let params = generation.params_for(family);
        debug!(model = %params.model, tier = ?params.tier, "Selected backend parameters");

        sink.status(
            Stage::Generating,
            format!("Generating {} puzzle for {} audience", family, tier),
        )
        .await;
        if sink.is_closed() {
            debug!("Consumer dropped the stream before the backend call");
            return Ok(());
        }

        let backend_request = BackendRequest::new(
            system_prompt(family),
            user_prompt(family, tier, hint.as_deref()),
            params,
        );
        let output = self.call_backend(&backend_request, sink).await?;

        sink.status(Stage::Parsing, "Reading model output").await;
        let (value, repaired) = JsonRepairer::new().parse_or_repair(&output.text)?;

        let mut candidate = Candidate::from_value(family, &value);
        if let Some(field) = candidate.missing_required() {
            return Err(ForgeError::IncompleteCandidate(format!("missing {}", field)));
        }

        sink.status(Stage::Validating, "Checking answer consistency").await;
        let validator = LogicValidator::new();
        let mut validation = validator.validate(&candidate);
        let mut auto_corrected = false;

        if !validation.is_valid {
            debug!(errors = ?validation.errors, "Validation failed, attempting correction");
            sink.status(Stage::Correcting, "Correcting inconsistent answer").await;
            candidate = AutoCorrector::new().correct(&candidate);
            validation = validator.validate(&candidate);

            if validation.is_valid {
                auto_corrected = true;
                info!("Auto-correction resolved validation errors");
            } else {
                let shown: Vec<&str> = validation
                    .errors
                    .iter()
                    .take(WARNED_ERRORS)
                    .map(String::as_str)
                    .collect();
                warn!(errors = ?validation.errors, "Validation issues remain after correction");
                sink.warning(format!("Validation issues remain: {}", shown.join("; ")))
                    .await;
            }
        }

        candidate.difficulty = self.config.difficulty.normalize(candidate.difficulty, tier);

        sink.status(Stage::Saving, "Saving content").await;
        let content = NewContent::from_candidate(
            &candidate,
            tier,
            &caller,
            auto_corrected,
            validation.is_valid,
        );
        let stored = match self.services.store.create(content.clone()).await {
            Ok(stored) => Some(stored),
            Err(err) => {
                warn!(error = %err, "Persisting content failed");
                sink.warning(format!("Content was not saved: {}", err)).await;
                None
            }
        };

        let cost = self
            .services
            .costs
            .record(family, &output.backend_id, &output.usage);
        let duration = started.elapsed();
        self.services.metrics.record(UsageRecord::success(
            family,
            duration,
            validation.is_valid,
            auto_corrected,
        ));
        info!(
            persisted = stored.is_some(),
            auto_corrected,
            valid = validation.is_valid,
            cost = cost.cost,
            "Generation finished"
        );

        let artifact = GeneratedArtifact {
            persisted: stored.is_some(),
            id: stored.as_ref().map(|s| s.id.clone()),
            created_at: stored.map(|s| s.created_at),
            content,
            validation_errors: validation.errors,
            repaired,
            backend_id: output.backend_id,
            usage: output.usage,
            cost: cost.cost,
        };
        sink.emit(ProgressEvent::Artifact {
            artifact: Box::new(artifact),
        })
        .await;
        sink.emit(ProgressEvent::Done {
            duration_ms: duration.as_millis() as u64,
        })
        .await;
        Ok(())
    }

    /// Streaming call with bounded retry, then the reasoning-tier fallback
    #[instrument(skip_all, fields(model = %request.params.model))]
    async fn call_backend(
        &self,
        request: &BackendRequest,
        sink: &EventSink,
    ) -> Result<BackendOutput> {
        let backend = self.services.backend.as_ref();
        let timeout = request.params.timeout();

        let retry = &self.config.generation.retry;
        let (text, usage) = run_with_retry(retry, "backend stream", |attempt| async move {
            debug!(attempt, "Opening backend stream");
            let drained = with_timeout(timeout, drain(backend, request), "backend stream").await;
            AttemptOutcome::classify(drained)
        })
        .await?;

        if !text.trim().is_empty() {
            let usage = usage.unwrap_or_else(|| {
                estimate_usage(&[request.system.as_str(), request.user.as_str()], &text)
            });
            return Ok(BackendOutput {
                text,
                usage,
                backend_id: request.params.model.clone(),
            });
        }

        if !request.params.is_reasoning() {
            return Err(ForgeError::EmptyOutput {
                backend: backend.name().to_string(),
            });
        }

        warn!("Reasoning backend returned no output, falling back");
        sink.status(Stage::Fallback, "Retrying with the general-purpose model")
            .await;
        let fallback = request.with_params(self.config.generation.fallback.clone());
        let completion = with_timeout(
            fallback.params.timeout(),
            backend.complete(&fallback),
            "backend fallback",
        )
        .await?;

        if completion.text.trim().is_empty() {
            return Err(ForgeError::EmptyOutput {
                backend: backend.name().to_string(),
            });
        }
        let usage = completion.usage.unwrap_or_else(|| {
            estimate_usage(
                &[fallback.system.as_str(), fallback.user.as_str()],
                &completion.text,
            )
        });
        Ok(BackendOutput {
            text: completion.text,
            usage,
            backend_id: fallback.params.model,
        })
    }
}

/// Read a stream to the end
async fn drain(
    backend: &dyn GenerationBackend,
    request: &BackendRequest,
) -> Result<(String, Option<TokenUsage>)> {
    let mut stream = backend.stream(request).await?;
    let mut text = String::new();
    let mut usage = None;

    while let Some(chunk) = stream.next().await {
        match chunk? {
            StreamChunk::Text(fragment) => text.push_str(&fragment),
            StreamChunk::Usage(reported) => usage = Some(reported),
        }
    }
    Ok((text, usage))
}

/// Message shown to the caller; internal failures stay generic
fn public_message(err: &ForgeError) -> String {
    match err {
        ForgeError::Io(_)
        | ForgeError::Database(_)
        | ForgeError::Json(_)
        | ForgeError::Internal(_) => "Internal error during generation".to_string(),
        other => other.to_string(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "Unknown panic".to_string())
}

// =============================================================================
// Tests
// =============================================================================
