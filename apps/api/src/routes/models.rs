use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Speed {
    Fast,
    Medium,
    Slow,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub speed: Speed,
}

/// Models offered to the client. Advisory only: any model id is passed through upstream.
pub const MODEL_CATALOG: &[ModelInfo] = &[
    ModelInfo {
        id: "gemini-2.5-pro",
        label: "Gemini 2.5 Pro",
        description: "Strong general-purpose writer",
        speed: Speed::Medium,
    },
    ModelInfo {
        id: "grok-4-fast",
        label: "Grok 4 Fast",
        description: "X.AI's fast Grok model",
        speed: Speed::Fast,
    },
    ModelInfo {
        id: "deepseek",
        label: "DeepSeek",
        description: "Fast and cost-effective",
        speed: Speed::Fast,
    },
    ModelInfo {
        id: "supermind-agent-v1",
        label: "Supermind Agent",
        description: "Multi-tool agent with web search",
        speed: Speed::Slow,
    },
];

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub default: String,
    pub models: &'static [ModelInfo],
}

/// GET /api/v1/models
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        default: state.config.default_model.clone(),
        models: MODEL_CATALOG,
    })
}
