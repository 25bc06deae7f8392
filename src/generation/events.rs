//! Progress events emitted by a generation run
//!
//! Serialized as `{"type": "...", ...}`. A run emits any number of `status`
//! and `warning` events followed by exactly one terminal event: `error`, or
//! `artifact` then `done`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::ai::TokenUsage;
use crate::storage::NewContent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Generating,
    Fallback,
    Parsing,
    Validating,
    Correcting,
    Saving,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Generating => "generating",
            Stage::Fallback => "fallback",
            Stage::Parsing => "parsing",
            Stage::Validating => "validating",
            Stage::Correcting => "correcting",
            Stage::Saving => "saving",
        };
        f.write_str(name)
    }
}

/// Finished content as handed to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    /// Store id; absent when persistence failed
    pub id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub persisted: bool,
    pub content: NewContent,
    /// Validation errors left after correction
    pub validation_errors: Vec<String>,
    /// Whether the model output needed JSON repair
    pub repaired: bool,
    pub backend_id: String,
    pub usage: TokenUsage,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Status {
        stage: Stage,
        message: String,
    },
    Warning {
        message: String,
    },
    Error {
        kind: String,
        message: String,
    },
    Artifact {
        artifact: Box<GeneratedArtifact>,
    },
    Done {
        duration_ms: u64,
    },
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Error { .. } | ProgressEvent::Done { .. })
    }
}

/// Producer side of a run's event channel.
///
/// Sends never fail: once the consumer is gone, events are dropped.
#[derive(Clone)]
pub(crate) struct EventSink {
    tx: mpsc::Sender<ProgressEvent>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub(crate) async fn emit(&self, event: ProgressEvent) {
        if self.tx.send(event).await.is_err() {
            tracing::trace!("Event consumer gone, dropping event");
        }
    }

    pub(crate) async fn status(&self, stage: Stage, message: impl Into<String>) {
        self.emit(ProgressEvent::Status {
            stage,
            message: message.into(),
        })
        .await;
    }

    pub(crate) async fn warning(&self, message: impl Into<String>) {
        self.emit(ProgressEvent::Warning {
            message: message.into(),
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let status = ProgressEvent::Status {
            stage: Stage::Generating,
            message: "Generating pattern puzzle".to_string(),
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["type"], "status");
        assert_eq!(value["stage"], "generating");

        let done = serde_json::to_value(ProgressEvent::Done { duration_ms: 12 }).unwrap();
        assert_eq!(done, serde_json::json!({"type": "done", "duration_ms": 12}));
    }

    #[test]
    fn test_terminal_events() {
        assert!(ProgressEvent::Done { duration_ms: 0 }.is_terminal());
        assert!(
            ProgressEvent::Error {
                kind: "timeout".into(),
                message: "x".into()
            }
            .is_terminal()
        );
        assert!(!ProgressEvent::Warning { message: "w".into() }.is_terminal());
    }

    #[tokio::test]
    async fn test_sink_ignores_closed_consumer() {
        let (tx, rx) = mpsc::channel(1);
        let sink = EventSink::new(tx);
        drop(rx);
        assert!(sink.is_closed());
        sink.warning("nobody listens").await;
    }
}
