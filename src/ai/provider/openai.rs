//! OpenAI-compatible Chat Completions backend
//!
//! Streams completions over server-sent events with
//! `stream_options.include_usage`, so the final event carries token usage.
//! Works with any endpoint that speaks the same protocol.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::{
    BackendRequest, BackendTier, Completion, FragmentStream, GenerationBackend, StreamChunk,
    TokenUsage,
};
use crate::config::LlmConfig;
use crate::types::{ErrorCategory, ErrorClassifier, ForgeError, LlmError, Result};

const PROVIDER: &str = "openai";

/// OpenAI-compatible backend with secure API key handling
pub struct OpenAiCompatibleBackend {
    /// API key stored securely - never exposed in logs or debug output
    api_key: SecretString,
    api_base: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiCompatibleBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleBackend")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl OpenAiCompatibleBackend {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(&config.api_key_env).ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ForgeError::Config(format!(
                    "API key not found. Set {} or llm.api_key in config",
                    config.api_key_env
                ))
            })?;

        let api_base = Self::validate_endpoint(&config.api_base)?;

        // No overall timeout here: each attempt is bounded by its family's timeout
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ForgeError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: SecretString::from(api_key),
            api_base,
            client,
        })
    }

    /// Only http/https endpoints are accepted
    fn validate_endpoint(endpoint: &str) -> Result<String> {
        let url = url::Url::parse(endpoint).map_err(|e| {
            ForgeError::Config(format!("Invalid API endpoint URL '{}': {}", endpoint, e))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ForgeError::Config(format!(
                "API endpoint must use http or https scheme, got: {}",
                url.scheme()
            )));
        }

        let mut result = url.to_string();
        if result.ends_with('/') {
            result.pop();
        }
        Ok(result)
    }

    fn build_request(&self, request: &BackendRequest, stream: bool) -> ChatCompletionRequest {
        let params = &request.params;
        let reasoning = params.tier == BackendTier::Reasoning;

        ChatCompletionRequest {
            model: params.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user.clone(),
                },
            ],
            // Reasoning models reject sampling parameters and `max_tokens`
            temperature: (!reasoning).then_some(params.temperature),
            max_tokens: (!reasoning).then_some(params.max_tokens),
            max_completion_tokens: reasoning.then_some(params.max_tokens),
            response_format: (!reasoning).then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
            stream,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }

    async fn send(&self, body: &ChatCompletionRequest) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(body)
            .send()
            .await
            .map_err(|e| ErrorClassifier::classify_reqwest(&e, PROVIDER))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let text = response.text().await.unwrap_or_default();

        let mut err = ErrorClassifier::classify_http_status(
            status.as_u16(),
            &format!("API error ({}): {}", status, text),
            PROVIDER,
        );
        if let Some(wait) = retry_after {
            err = err.retry_after(wait);
        }
        Err(err.into())
    }
}

#[async_trait]
impl GenerationBackend for OpenAiCompatibleBackend {
    #[instrument(skip(self, request), fields(model = %request.params.model))]
    async fn stream(&self, request: &BackendRequest) -> Result<FragmentStream> {
        debug!("Opening completion stream");
        let body = self.build_request(request, true);
        let response = self.send(&body).await?;
        Ok(sse_chunks(response.bytes_stream()))
    }

    #[instrument(skip(self, request), fields(model = %request.params.model))]
    async fn complete(&self, request: &BackendRequest) -> Result<Completion> {
        info!("Requesting non-streaming completion");
        let body = self.build_request(request, false);
        let response = self.send(&body).await?;

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            ForgeError::Backend(LlmError::with_provider(
                ErrorCategory::Unknown,
                format!("Failed to decode completion: {}", e),
                PROVIDER,
            ))
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(Completion {
            text,
            usage: parsed
                .usage
                .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens)),
        })
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

// =============================================================================
// Server-Sent Events
// =============================================================================

/// Splits a byte stream into `data:` payloads
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut payloads = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(payload) = data_payload(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Whatever is left once the connection closes
    fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buffer);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\r', '\n']);
    line.strip_prefix("data:")
        .map(|payload| payload.trim_start().to_string())
}

enum SsePayload {
    Chunks(Vec<StreamChunk>),
    Done,
    Failed(LlmError),
}

fn parse_payload(payload: &str) -> SsePayload {
    if payload == "[DONE]" {
        return SsePayload::Done;
    }

    let chunk: ChatCompletionChunk = match serde_json::from_str(payload) {
        Ok(chunk) => chunk,
        Err(e) => {
            debug!(error = %e, "Skipping undecodable stream event");
            return SsePayload::Chunks(Vec::new());
        }
    };

    if let Some(error) = chunk.error {
        return SsePayload::Failed(ErrorClassifier::classify(&error.message, PROVIDER));
    }

    let mut chunks: Vec<StreamChunk> = chunk
        .choices
        .into_iter()
        .filter_map(|c| c.delta.content)
        .filter(|text| !text.is_empty())
        .map(StreamChunk::Text)
        .collect();
    if let Some(usage) = chunk.usage {
        chunks.push(StreamChunk::Usage(TokenUsage::new(
            usage.prompt_tokens,
            usage.completion_tokens,
        )));
    }
    SsePayload::Chunks(chunks)
}

struct SseState<S> {
    bytes: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<StreamChunk>>,
    finished: bool,
}

impl<S> SseState<S> {
    fn absorb(&mut self, payloads: Vec<String>) {
        for payload in payloads {
            if self.finished {
                break;
            }
            match parse_payload(&payload) {
                SsePayload::Chunks(chunks) => self.pending.extend(chunks.into_iter().map(Ok)),
                SsePayload::Done => self.finished = true,
                SsePayload::Failed(err) => {
                    self.pending.push_back(Err(err.into()));
                    self.finished = true;
                }
            }
        }
    }
}

/// Turn an SSE byte stream into text and usage chunks
fn sse_chunks<S, B>(bytes: S) -> FragmentStream
where
    S: Stream<Item = reqwest::Result<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = SseState {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(bytes)) => {
                    let payloads = state.decoder.push(bytes.as_ref());
                    state.absorb(payloads);
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Completion stream interrupted");
                    state
                        .pending
                        .push_back(Err(ErrorClassifier::classify_reqwest(&e, PROVIDER).into()));
                    state.finished = true;
                }
                None => {
                    let rest: Vec<String> = state.decoder.finish().into_iter().collect();
                    state.absorb(rest);
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    usage: Option<UsageInfo>,
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::BackendParams;

    async fn collect(parts: &[&str]) -> Vec<Result<StreamChunk>> {
        let owned: Vec<reqwest::Result<Vec<u8>>> =
            parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        sse_chunks(futures::stream::iter(owned)).collect().await
    }

    #[tokio::test]
    async fn test_sse_text_and_usage() {
        let items = collect(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"{\\\"ti\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"tle\\\"\"}}]}\n\ndata: {\"choices\":[],",
            "\"usage\":{\"prompt_tokens\":12,\"completion_tokens\":3}}\n\n",
            "data: [DONE]\n\n",
        ])
        .await;

        let chunks: Vec<StreamChunk> = items.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(
            chunks,
            vec![
                StreamChunk::Text("{\"ti".into()),
                StreamChunk::Text("tle\"".into()),
                StreamChunk::Usage(TokenUsage::new(12, 3)),
            ]
        );
    }

    #[tokio::test]
    async fn test_sse_stops_at_done() {
        let items = collect(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n",
            "data: [DONE]\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n",
        ])
        .await;
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_sse_error_event() {
        let items = collect(&["data: {\"error\":{\"message\":\"Rate limit reached\"}}\n"]).await;
        assert_eq!(items.len(), 1);
        match &items[0] {
            Err(ForgeError::Backend(e)) => assert_eq!(e.category, ErrorCategory::RateLimit),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sse_empty_stream() {
        let items = collect(&[": keep-alive\n\n", "data: [DONE]\n\n"]).await;
        assert!(items.is_empty());
    }

    #[test]
    fn test_validate_endpoint() {
        assert_eq!(
            OpenAiCompatibleBackend::validate_endpoint("https://api.openai.com/v1/").unwrap(),
            "https://api.openai.com/v1"
        );
        assert!(OpenAiCompatibleBackend::validate_endpoint("file:///etc/passwd").is_err());
        assert!(OpenAiCompatibleBackend::validate_endpoint("not a url").is_err());
    }

    #[test]
    fn test_reasoning_request_shape() {
        let config = LlmConfig {
            api_key: Some("sk-test".into()),
            ..Default::default()
        };
        let backend = OpenAiCompatibleBackend::new(&config).unwrap();

        let request = BackendRequest::new("sys", "user", BackendParams::reasoning());
        let body = serde_json::to_value(backend.build_request(&request, true)).unwrap();
        assert!(body.get("temperature").is_none());
        assert!(body.get("max_tokens").is_none());
        assert!(body["max_completion_tokens"].is_number());
        assert_eq!(body["stream_options"]["include_usage"], true);

        let request = BackendRequest::new("sys", "user", BackendParams::general());
        let body = serde_json::to_value(backend.build_request(&request, false)).unwrap();
        assert_eq!(body["response_format"]["type"], "json_object");
        assert!(body.get("stream_options").is_none());
        assert_eq!(body["messages"][0]["role"], "system");
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = LlmConfig {
            api_key: Some("sk-secret".into()),
            ..Default::default()
        };
        let backend = OpenAiCompatibleBackend::new(&config).unwrap();
        let debug = format!("{:?}", backend);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("REDACTED"));
    }
}
