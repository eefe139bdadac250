//! Application state shared across all route handlers.
//!
//! AppState is passed to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use protea_chat::QueryDispatcher;
use protea_core::config::ProteaConfig;
use protea_storage::ProteinRepository;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Resolved configuration. Read-only after startup.
    pub config: Arc<ProteaConfig>,
    /// Protein table access.
    pub proteins: Arc<ProteinRepository>,
    /// Chat dispatcher for `/query/`.
    pub dispatcher: Arc<QueryDispatcher>,
    /// Whether the language-model agents have a credential.
    pub llm_configured: bool,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: ProteaConfig,
        proteins: Arc<ProteinRepository>,
        dispatcher: QueryDispatcher,
        llm_configured: bool,
    ) -> Self {
        Self {
            config: Arc::new(config),
            proteins,
            dispatcher: Arc::new(dispatcher),
            llm_configured,
            start_time: Instant::now(),
        }
    }
}
