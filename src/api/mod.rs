//! REST API for the intro analyzer
//!
//! Ingestion, listing, search and visual direction endpoints over the
//! shared pipeline and store.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::info;

use crate::config::Config;
use crate::direction::DirectionGenerator;
use crate::llm::LLM;
use crate::processing::IngestionPipeline;
use crate::search::RelevanceSearchEngine;
use crate::store::IntroStore;

pub mod handlers;
pub mod models;
pub mod server;

pub use handlers::{ApiError, AppState};

impl AppState {
    pub fn new(config: &Config, llm: Arc<dyn LLM>, store: Arc<dyn IntroStore>) -> Self {
        Self {
            pipeline: IngestionPipeline::from_config(config, llm.clone(), store.clone()),
            store,
            search: RelevanceSearchEngine::new(),
            directions: DirectionGenerator::new(llm),
            ingest_permits: Arc::new(Semaphore::new(config.server.max_concurrent_ingests)),
            expose_internal_errors: config.server.expose_internal_errors,
        }
    }
}

/// API Server for handling REST requests
pub struct ApiServer {
    state: AppState,
    host: String,
    port: u16,
}

impl ApiServer {
    pub fn new(state: AppState, host: impl Into<String>, port: u16) -> Self {
        Self {
            state,
            host: host.into(),
            port,
        }
    }

    /// Start the API server
    pub async fn start(self) -> Result<()> {
        info!("🚀 Starting API server on {}:{}", self.host, self.port);
        server::start_http_server(self.state, &self.host, self.port).await
    }
}
