//! Job description scraping: URL → plain description text.
//!
//! The production scraper asks a browsing-capable model to read the page and return
//! only the posting. Callers treat it as an opaque text-extraction oracle.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::job_description::prompts::{build_scrape_prompt, SCRAPE_SYSTEM};
use crate::llm_client::{ChatMessage, CompletionRequest, CompletionService, LlmError};

const SCRAPE_TEMPERATURE: f32 = 0.3;
const SCRAPE_MAX_TOKENS: u32 = 4000;

#[async_trait]
pub trait JobScraper: Send + Sync {
    /// Extracted description text. An empty string means nothing usable was found.
    async fn scrape_text(&self, url: &str) -> Result<String, LlmError>;
}

/// Scraper backed by a completion model that can fetch URLs.
pub struct LlmScraper {
    llm: Arc<dyn CompletionService>,
    model: String,
}

impl LlmScraper {
    pub fn new(llm: Arc<dyn CompletionService>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }
}

#[async_trait]
impl JobScraper for LlmScraper {
    async fn scrape_text(&self, url: &str) -> Result<String, LlmError> {
        debug!("Scraping job description from {url} with model {}", self.model);

        let request = CompletionRequest::new(
            self.model.as_str(),
            vec![
                ChatMessage::system(SCRAPE_SYSTEM),
                ChatMessage::user(build_scrape_prompt(url)),
            ],
            SCRAPE_TEMPERATURE,
            SCRAPE_MAX_TOKENS,
        );

        match self.llm.complete(request).await {
            Ok(text) => Ok(text.trim().to_string()),
            Err(LlmError::EmptyContent) => Ok(String::new()),
            Err(e) => Err(e),
        }
    }
}
