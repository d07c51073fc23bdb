use std::sync::Arc;

use crate::ats::AtsScorer;
use crate::config::Config;
use crate::llm_client::Generator;
use crate::sessions::SessionEngine;
use crate::store::SessionStore;
use crate::streaming::StreamCoordinator;
use crate::summarizer::ContextSummarizer;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SessionEngine>,
    pub coordinator: Arc<StreamCoordinator>,
    pub ats: Arc<AtsScorer>,
}

impl AppState {
    /// Wires the components around one store and one generator.
    pub fn new(store: Arc<dyn SessionStore>, generator: Arc<dyn Generator>, config: &Config) -> Self {
        let summarizer = Arc::new(ContextSummarizer::new(
            Arc::clone(&store),
            Arc::clone(&generator),
        ));
        let engine = Arc::new(SessionEngine::new(
            store,
            summarizer,
            config.limits.clone(),
        ));
        let coordinator = Arc::new(StreamCoordinator::new(
            Arc::clone(&engine),
            Arc::clone(&generator),
            config.generation_timeout,
        ));
        let ats = Arc::new(AtsScorer::new(generator));

        Self {
            engine,
            coordinator,
            ats,
        }
    }
}
