//! Axum route handlers for the Job Description API.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ScrapeRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResponse {
    pub job_description: String,
}

/// POST /api/v1/jd/scrape
///
/// Extracts the job description behind a URL. Lets the client preview the scrape
/// before refining.
pub async fn handle_scrape(
    State(state): State<AppState>,
    Json(request): Json<ScrapeRequest>,
) -> Result<Json<ScrapeResponse>, AppError> {
    let url = request
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::MissingInput("URL is required".to_string()))?;

    let job_description = state.scraper.scrape_text(url).await?;

    Ok(Json(ScrapeResponse { job_description }))
}
