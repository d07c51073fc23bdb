use axum::response::sse::Event;
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::extraction::ExtractedArtifact;
use crate::models::session::SessionKind;

/// One named event of a reply stream. Exactly one of `Done` / `Error` ends every stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Message {
        text: String,
    },
    ArtifactReady {
        artifact_id: Uuid,
        kind: SessionKind,
        payload: Value,
    },
    Done,
    Error {
        error: String,
    },
}

impl StreamEvent {
    pub fn artifact_ready(artifact_id: Uuid, artifact: &ExtractedArtifact) -> Self {
        StreamEvent::ArtifactReady {
            artifact_id,
            kind: artifact.kind(),
            payload: artifact.payload(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Message { .. } => "message",
            StreamEvent::ArtifactReady { .. } => "artifact_ready",
            StreamEvent::Done => "done",
            StreamEvent::Error { .. } => "error",
        }
    }

    pub fn data(&self) -> Value {
        match self {
            StreamEvent::Message { text } => json!({ "text": text }),
            StreamEvent::ArtifactReady {
                artifact_id,
                kind,
                payload,
            } => json!({
                "artifact_id": artifact_id,
                "kind": kind,
                "payload": payload,
            }),
            StreamEvent::Done => json!({}),
            StreamEvent::Error { error } => json!({ "error": error }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error { .. })
    }

    pub fn into_sse(self) -> Event {
        Event::default().event(self.name()).data(self.data().to_string())
    }
}

/// Relays fragments to the client while accumulating them.
///
/// A fragment is accumulated and emitted in the same call, so the two never
/// diverge. Sends to a departed client are dropped silently.
pub struct EventSink {
    tx: UnboundedSender<StreamEvent>,
    accumulated: String,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<StreamEvent>) -> Self {
        Self {
            tx,
            accumulated: String::new(),
        }
    }

    pub fn relay(&mut self, fragment: String) {
        if fragment.is_empty() {
            return;
        }
        self.accumulated.push_str(&fragment);
        self.emit(StreamEvent::Message { text: fragment });
    }

    pub fn emit(&self, event: StreamEvent) {
        let _ = self.tx.send(event);
    }

    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }
}
