use std::sync::Arc;

use crate::config::Config;
use crate::job_description::scraper::JobScraper;
use crate::llm_client::CompletionService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Completion gateway. Default: `LlmClient` against the configured base URL.
    pub llm: Arc<dyn CompletionService>,
    /// Job description scraper. Default: `LlmScraper` using `config.scrape_model`.
    pub scraper: Arc<dyn JobScraper>,
    pub config: Config,
}
