//! First-pass refinement: job description + raw bullets → tailored bullets.
//!
//! Flow: build prompt → completion (single-shot or streamed) → sanitize against the
//! user's original bullet count.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::llm_client::{ChatMessage, CompletionRequest, CompletionService, LlmError, StreamEvent};
use crate::refinement::prompts::{
    build_refinement_prompt, REFINEMENT_MAX_TOKENS, REFINEMENT_TEMPERATURE,
};
use crate::refinement::sanitizer::{
    count_input_bullets, sanitize_bullets, SanitizedBullets, SanitizerConfig,
};

/// Fragments buffered between the upstream reader and a slow consumer.
const STREAM_CHANNEL_CAPACITY: usize = 32;

pub fn build_refine_request(job_description: &str, bullets: &str, model: &str) -> CompletionRequest {
    CompletionRequest::new(
        model,
        vec![ChatMessage::user(build_refinement_prompt(
            job_description,
            bullets,
        ))],
        REFINEMENT_TEMPERATURE,
        REFINEMENT_MAX_TOKENS,
    )
}

/// Single-shot refinement with sanitized output.
pub async fn refine(
    llm: &dyn CompletionService,
    job_description: &str,
    bullets: &str,
    model: &str,
    sanitizer: &SanitizerConfig,
) -> Result<SanitizedBullets, AppError> {
    let original_count = count_input_bullets(bullets);
    info!("Refining {} bullets with model {}", original_count, model);

    let raw = llm
        .complete(build_refine_request(job_description, bullets, model))
        .await?;

    let sanitized = sanitize_bullets(&raw, Some(original_count), sanitizer);
    match &sanitized {
        SanitizedBullets::Bullets(set) => {
            debug!("Sanitized output kept {} bullets", set.iter().count())
        }
        SanitizedBullets::Verbatim(_) => {
            warn!("Model output had no recognizable bullets; returning it unmodified")
        }
    }
    Ok(sanitized)
}

/// Starts a streamed refinement on a background task and returns the event channel.
///
/// The channel yields fragments, then exactly one `Done` or one `Failed`, then closes.
/// Dropping the receiver stops forwarding.
pub fn spawn_refine_stream(
    llm: Arc<dyn CompletionService>,
    job_description: &str,
    bullets: &str,
    model: &str,
) -> mpsc::Receiver<StreamEvent> {
    let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
    let request = build_refine_request(job_description, bullets, model);
    info!(
        "Streaming refinement of {} bullets with model {}",
        count_input_bullets(bullets),
        model
    );

    tokio::spawn(async move {
        match llm.complete_streaming(request, tx).await {
            Ok(full_text) => debug!("Refinement stream delivered {} chars", full_text.len()),
            Err(LlmError::ChannelClosed) => debug!("Refinement stream abandoned by client"),
            Err(e) => warn!("Refinement stream failed: {e}"),
        }
    });

    rx
}
