pub mod health;
pub mod models;

use axum::{
    routing::{get, post},
    Router,
};

use crate::job_description::handlers::handle_scrape;
use crate::refinement::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/models", get(models::list_models))
        // Job description
        .route("/api/v1/jd/scrape", post(handle_scrape))
        // Refinement
        .route("/api/v1/refine", post(handlers::handle_refine))
        .route("/api/v1/refine/stream", post(handlers::handle_refine_stream))
        .route("/api/v1/refine/chat", post(handlers::handle_chat_refine))
        .with_state(state)
}
