//! Job Description Resolver: pasted text and/or URL → one job description string.
//!
//! A usable scrape wins over pasted text. A failed or empty scrape falls back to the
//! pasted text and is only logged; with nothing to fall back to it is `ScrapeFailed`.

use tracing::{info, warn};

use crate::errors::AppError;
use crate::job_description::scraper::JobScraper;

pub async fn resolve_job_description(
    scraper: &dyn JobScraper,
    text: Option<&str>,
    url: Option<&str>,
) -> Result<String, AppError> {
    let text = text.map(str::trim).filter(|t| !t.is_empty());
    let url = url.map(str::trim).filter(|u| !u.is_empty());

    let Some(url) = url else {
        return text.map(str::to_string).ok_or_else(|| {
            AppError::MissingInput("Job description is required (either text or URL)".to_string())
        });
    };

    match scraper.scrape_text(url).await {
        Ok(scraped) if !scraped.trim().is_empty() => {
            info!("Resolved job description from {url} ({} chars)", scraped.len());
            return Ok(scraped.trim().to_string());
        }
        Ok(_) => warn!("Scrape of {url} returned no text"),
        Err(e) => warn!("Scrape of {url} failed: {e}"),
    }

    match text {
        Some(text) => {
            info!("Falling back to pasted job description text");
            Ok(text.to_string())
        }
        None => Err(AppError::ScrapeFailed),
    }
}
