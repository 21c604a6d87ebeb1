//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::generation::GenerationEngine;
use crate::session::SessionService;
use crate::web::generation_task::GenerationPipeline;
use study_genie_core::ports::{DatabaseService, TextExtractionService};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub sessions: Arc<SessionService>,
    pub extractor: Arc<dyn TextExtractionService>,
    pub engine: GenerationEngine,
    pub pipeline: Arc<GenerationPipeline>,
}
