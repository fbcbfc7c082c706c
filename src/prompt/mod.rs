use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    ai::{
        prompts::{summary_prompt, summary_request},
        validate::{validate_summary, TrendSummary},
    },
    error::ApiError,
    extract::JsonBody,
    guest::Caller,
    history::services::save_summary,
    response::{success, Envelope},
    sanitize::clean_line,
    state::AppState,
};

pub const PROMPT_MAX_CHARS: usize = 500;

const AI_ERROR_TITLE: &str = "AI Summary Error";
const AI_ERROR_MESSAGE: &str =
    "Sorry, we couldn't generate a summary at this time. Please try again later or contact support.";

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    pub prompt: Option<String>,
    /// Persist to history when the caller is signed in. Defaults to true.
    pub save: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct PromptResponse {
    #[serde(flatten)]
    pub summary: TrendSummary,
    #[serde(rename = "searchTerm")]
    pub search_term: String,
    pub saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_id: Option<Uuid>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/prompt/summary", post(generate_summary))
}

fn require_prompt(raw: Option<&str>) -> Result<String, ApiError> {
    let prompt = clean_line(raw.unwrap_or_default());
    if prompt.is_empty() {
        return Err(ApiError::validation("Please provide a trend to summarize"));
    }
    if prompt.chars().count() > PROMPT_MAX_CHARS {
        return Err(ApiError::validation(format!(
            "Trend must be at most {PROMPT_MAX_CHARS} characters"
        )));
    }
    Ok(prompt)
}

fn upstream(detail: impl ToString) -> ApiError {
    ApiError::UpstreamAi {
        title: AI_ERROR_TITLE,
        message: AI_ERROR_MESSAGE,
        detail: detail.to_string(),
    }
}

/// Generates a summary for a signed-in user or a guest within quota. A failed history
/// write is logged and reported as `saved: false`; the summary is still returned.
#[instrument(skip_all)]
pub async fn generate_summary(
    State(state): State<AppState>,
    caller: Caller,
    JsonBody(payload): JsonBody<PromptRequest>,
) -> Result<Json<Envelope<PromptResponse>>, ApiError> {
    let topic = require_prompt(payload.prompt.as_deref())?;

    let prompt = summary_prompt(&topic);
    let raw = state
        .ai
        .generate(summary_request(&prompt))
        .await
        .map_err(|e| upstream(format!("{e:#}")))?;
    let summary = validate_summary(&raw).map_err(upstream)?;

    let mut saved = false;
    let mut history_id = None;
    if let (Some(user_id), true) = (caller.user_id(), payload.save.unwrap_or(true)) {
        match save_summary(&state.db, user_id, &topic, &summary).await {
            Ok(row) => {
                saved = true;
                history_id = Some(row.id);
            }
            Err(e) => warn!(%user_id, error = %e, "summary generated but not saved to history"),
        }
    }

    let meta = match &caller {
        Caller::User(claims) => {
            info!(user_id = %claims.user_id, saved, "summary generated");
            None
        }
        Caller::Guest(pass) => {
            let max = state.config.security.guest_max_requests;
            info!(guest = %pass.ip_hash, request_count = pass.request_count, "guest summary generated");
            Some(json!({
                "guest": true,
                "request_count": pass.request_count,
                "remaining_requests": (max - pass.request_count).max(0),
            }))
        }
    };

    let body = success(
        "AI Trend Summary",
        "Successfully generated structured summary",
        PromptResponse {
            summary,
            search_term: topic,
            saved,
            history_id,
        },
    );
    Ok(match meta {
        Some(meta) => Json(body.0.with_meta(meta)),
        None => body,
    })
}
