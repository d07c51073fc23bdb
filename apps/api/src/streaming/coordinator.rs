use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{FutureExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::{timeout_at, Instant};
use tracing::{error, warn};

use crate::extraction;
use crate::llm_client::{Generator, LlmError};
use crate::models::session::Session;
use crate::sessions::engine::{SessionEngine, TurnHandle};
use crate::store::Transition;
use crate::streaming::events::{EventSink, StreamEvent};

/// Drives one generation per inbound message.
///
/// The reply runs on its own task. The client only holds the receiving end of
/// the event channel, so a disconnect never cancels persistence.
pub struct StreamCoordinator {
    engine: Arc<SessionEngine>,
    generator: Arc<dyn Generator>,
    timeout: Duration,
}

impl StreamCoordinator {
    pub fn new(engine: Arc<SessionEngine>, generator: Arc<dyn Generator>, timeout: Duration) -> Self {
        Self {
            engine,
            generator,
            timeout,
        }
    }

    /// Spawns the reply task and hands back its event stream.
    pub fn start(self: &Arc<Self>, turn: TurnHandle) -> UnboundedReceiver<StreamEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            coordinator.run(turn, EventSink::new(tx)).await;
        });
        rx
    }

    /// Relay, then finalize exactly once, then terminate the stream.
    pub async fn run(&self, turn: TurnHandle, mut sink: EventSink) {
        let session_id = turn.session.id;
        let outcome = AssertUnwindSafe(self.pump(&turn, &mut sink))
            .catch_unwind()
            .await;

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => {
                warn!("Generation failed for session {session_id}: {e}");
                Some(e.to_string())
            }
            Err(_) => {
                error!("Generation task panicked for session {session_id}");
                Some("Generation stopped unexpectedly".to_string())
            }
        };

        if let Some(ready) = self.finalize(&turn.session, sink.accumulated()).await {
            sink.emit(ready);
        }

        sink.emit(match failure {
            None => StreamEvent::Done,
            Some(error) => StreamEvent::Error { error },
        });
    }

    async fn pump(&self, turn: &TurnHandle, sink: &mut EventSink) -> Result<(), LlmError> {
        let deadline = Instant::now() + self.timeout;

        let mut fragments = timeout_at(
            deadline,
            self.generator
                .stream_generate(&turn.instructions, &turn.turns),
        )
        .await
        .map_err(|_| LlmError::Timeout)??;

        loop {
            match timeout_at(deadline, fragments.next()).await {
                Err(_) => return Err(LlmError::Timeout),
                Ok(None) => return Ok(()),
                Ok(Some(Ok(fragment))) => sink.relay(fragment),
                Ok(Some(Err(e))) => return Err(e),
            }
        }
    }

    /// Persists whatever was received and completes the session if the reply
    /// carries a usable artifact. Never fails outward.
    async fn finalize(&self, session: &Session, text: &str) -> Option<StreamEvent> {
        if text.is_empty() {
            return None;
        }
        match self.persist_and_extract(session, text).await {
            Ok(ready) => ready,
            Err(e) => {
                error!(
                    "Internal failure finalizing reply for session {}: {e:?}",
                    session.id
                );
                None
            }
        }
    }

    async fn persist_and_extract(
        &self,
        session: &Session,
        text: &str,
    ) -> anyhow::Result<Option<StreamEvent>> {
        self.engine.record_reply(session, text).await?;

        let Some(artifact) = extraction::extract(session.kind, text) else {
            return Ok(None);
        };

        match self.engine.complete_from_artifact(session, &artifact).await? {
            Transition::Completed {
                artifact_id: Some(artifact_id),
            } => Ok(Some(StreamEvent::artifact_ready(artifact_id, &artifact))),
            _ => Ok(None),
        }
    }
}
