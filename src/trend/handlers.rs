use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::repo::{self, HotTopicRow};
use crate::{
    ai::{prompts::hot_topics_request, validate::validate_hot_topics},
    error::ApiError,
    response::{success, Envelope},
    state::AppState,
};

pub const CRON_SECRET_HEADER: &str = "x-cron-secret";
const RETENTION_DAYS: i64 = 7;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HotTopicView {
    pub icon: String,
    pub title: String,
    pub description: String,
    pub query: String,
}

impl From<HotTopicRow> for HotTopicView {
    fn from(row: HotTopicRow) -> Self {
        Self {
            icon: row.icon,
            title: row.title,
            description: row.description,
            query: row.query,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HotTopicBatch {
    pub topics: Vec<HotTopicView>,
    #[serde(rename = "generatedAt", with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    #[serde(rename = "batchId")]
    pub batch_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored: Option<bool>,
}

pub fn trend_routes() -> Router<AppState> {
    Router::new()
        .route("/trend/hot-topics", get(hot_topics))
        .route("/trend/generate", post(generate_hot_topics))
}

#[instrument(skip_all)]
pub async fn hot_topics(State(state): State<AppState>) -> Result<Json<Envelope<HotTopicBatch>>, ApiError> {
    let rows = state
        .db
        .run(|pool| async move { repo::latest_batch(&pool).await })
        .await
        .map_err(|e| ApiError::database("Failed to retrieve hot AI topics", e))?;

    let Some(first) = rows.first() else {
        return Err(ApiError::not_found(
            "No Topics Found",
            "No hot topics available. Please try again later.",
        ));
    };
    let (generated_at, batch_id) = (first.created_at, first.batch_id);

    Ok(success(
        "Hot AI Topics Retrieved",
        "Successfully retrieved latest AI trends",
        HotTopicBatch {
            topics: rows.into_iter().map(HotTopicView::from).collect(),
            generated_at,
            batch_id,
            stored: None,
        },
    ))
}

/// When a cron secret is configured the caller must present it.
fn check_cron_secret(headers: &HeaderMap, expected: Option<&str>) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let presented = headers
        .get(CRON_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if presented != expected {
        warn!("hot topic generation called without a valid cron secret");
        return Err(ApiError::unauthenticated(
            "Unauthorized",
            "This endpoint is reserved for scheduled jobs",
        ));
    }
    Ok(())
}

fn generation_failed(detail: String) -> ApiError {
    ApiError::UpstreamAi {
        title: "AI Generation Error",
        message: "Sorry, we couldn't generate hot topics at this time. Please try again later.",
        detail,
    }
}

/// Called by the external scheduler: generate a fresh batch, store it, purge old ones.
#[instrument(skip_all)]
pub async fn generate_hot_topics(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Envelope<HotTopicBatch>>, ApiError> {
    check_cron_secret(&headers, state.config.cron_secret.as_deref())?;

    let raw = state
        .ai
        .generate(hot_topics_request())
        .await
        .map_err(|e| generation_failed(format!("{e:#}")))?;
    let drafts = validate_hot_topics(&raw).map_err(|e| generation_failed(e.to_string()))?;

    let batch_id = Uuid::new_v4();
    let generated_at = OffsetDateTime::now_utc();
    let topics = drafts.as_slice();
    state
        .db
        .run(|pool| async move { repo::insert_batch(&pool, batch_id, topics, generated_at).await })
        .await
        .map_err(|e| ApiError::database("Failed to store hot AI topics", e))?;
    info!(%batch_id, count = drafts.len(), "hot topic batch stored");

    let cutoff = generated_at - Duration::days(RETENTION_DAYS);
    match state
        .db
        .run(|pool| async move { repo::purge_older_than(&pool, cutoff).await })
        .await
    {
        Ok(purged) => info!(purged, "old hot topics purged"),
        Err(e) => warn!(error = %e, "failed to purge old hot topics"),
    }

    Ok(success(
        "Hot AI Topics Generated",
        "Successfully generated and stored latest AI trends",
        HotTopicBatch {
            topics: drafts
                .into_iter()
                .map(|d| HotTopicView {
                    icon: d.icon.as_str().to_string(),
                    title: d.title,
                    description: d.description,
                    query: d.query,
                })
                .collect(),
            generated_at,
            batch_id,
            stored: Some(true),
        },
    ))
}
