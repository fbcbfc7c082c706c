use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{
        HistoryQuery, PageRequest, SaveTrendRequest, SavedTrend, SearchInfo, TrendHistoryItem,
        TrendPage,
    },
    repo::TrendHistoryRow,
    services::save_summary,
};
use crate::{
    ai::{references::filter_references, validate::TrendSummary},
    auth::extractors::AuthUser,
    error::ApiError,
    extract::{JsonBody, QueryParams},
    response::{done, success, Envelope},
    sanitize::{clean_line, clean_text, escape_like},
    state::AppState,
};

pub const SEARCH_TERM_MAX: usize = 500;

pub fn history_routes() -> Router<AppState> {
    Router::new()
        .route("/prompt/history", get(list_history).post(save_history))
        .route("/prompt/history/:id", delete(delete_history))
}

fn trend_not_found() -> ApiError {
    ApiError::not_found(
        "Trend Not Found",
        "The requested trend was not found in your history",
    )
}

fn parse_trend_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::validation("Invalid trend id"))
}

fn required(raw: Option<String>) -> Option<String> {
    raw.map(|s| clean_text(&s)).filter(|s| !s.is_empty())
}

/// Checks and cleans a client-supplied summary.
fn summary_from_request(payload: SaveTrendRequest) -> Result<(String, TrendSummary), ApiError> {
    let missing = || ApiError::validation("All trend summary fields are required");

    let search_term = payload
        .search_term
        .as_deref()
        .map(clean_line)
        .filter(|s| !s.is_empty())
        .ok_or_else(missing)?;
    if search_term.chars().count() > SEARCH_TERM_MAX {
        return Err(ApiError::validation(format!(
            "Search term must be at most {SEARCH_TERM_MAX} characters"
        )));
    }
    let headline = required(payload.headline).ok_or_else(missing)?;
    let summary = required(payload.summary).ok_or_else(missing)?;
    let call_to_action = required(payload.call_to_action).ok_or_else(missing)?;
    let key_points: Vec<String> = payload
        .key_points
        .unwrap_or_default()
        .iter()
        .map(|p| clean_text(p))
        .filter(|p| !p.is_empty())
        .collect();
    if key_points.is_empty() {
        return Err(missing());
    }
    let references = filter_references(payload.article_references.unwrap_or_default());

    Ok((
        search_term,
        TrendSummary {
            headline,
            summary,
            key_points,
            call_to_action,
            references,
        },
    ))
}

#[instrument(skip_all, fields(user_id = %claims.user_id))]
pub async fn save_history(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    JsonBody(payload): JsonBody<SaveTrendRequest>,
) -> Result<(StatusCode, Json<Envelope<SavedTrend>>), ApiError> {
    let (search_term, summary) = summary_from_request(payload)?;
    let row = save_summary(&state.db, claims.user_id, &search_term, &summary)
        .await
        .map_err(|e| ApiError::database("Failed to save trend summary", e))?;

    info!(trend_id = %row.id, "trend saved to history");
    Ok((
        StatusCode::CREATED,
        success(
            "Trend Saved",
            "Successfully saved trend to your history",
            SavedTrend {
                id: row.id,
                saved_at: row.created_at,
            },
        ),
    ))
}

/// One endpoint, three shapes: `?id=` fetches a single item, `?q=` searches, otherwise
/// the newest page.
#[instrument(skip_all, fields(user_id = %claims.user_id))]
pub async fn list_history(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    QueryParams(query): QueryParams<HistoryQuery>,
) -> Result<Json<Envelope<Value>>, ApiError> {
    let user_id = claims.user_id;

    if let Some(raw_id) = query.id.as_deref().filter(|s| !s.trim().is_empty()) {
        let id = parse_trend_id(raw_id)?;
        let row = state
            .db
            .run(|pool| async move { TrendHistoryRow::find_for_user(&pool, id, user_id).await })
            .await
            .map_err(|e| ApiError::database("Failed to retrieve trend", e))?
            .ok_or_else(trend_not_found)?;
        return Ok(success(
            "Trend Retrieved",
            "Successfully retrieved trend details",
            json!(TrendHistoryItem::from(row)),
        ));
    }

    let page = PageRequest::from_query(query.page.as_deref(), query.limit.as_deref());
    let (limit, offset) = (page.limit, page.offset());
    let search = query.q.as_deref().map(clean_line).filter(|q| !q.is_empty());

    let Some(term) = search else {
        let (rows, total) = state
            .db
            .run(|pool| async move {
                let total = TrendHistoryRow::count_for_user(&pool, user_id).await?;
                let rows = TrendHistoryRow::list_for_user(&pool, user_id, limit, offset).await?;
                Ok::<_, sqlx::Error>((rows, total))
            })
            .await
            .map_err(|e| ApiError::database("Failed to retrieve trend history", e))?;
        let body = TrendPage {
            trends: rows.into_iter().map(TrendHistoryItem::from).collect(),
            search: None,
            pagination: page.describe(total),
        };
        return Ok(success(
            "Trend History Retrieved",
            "Successfully retrieved your trend history",
            json!(body),
        ));
    };

    let pattern = format!("%{}%", escape_like(&term));
    let pattern_ref = pattern.as_str();
    let (rows, total) = state
        .db
        .run(|pool| async move {
            let total = TrendHistoryRow::count_search(&pool, user_id, pattern_ref).await?;
            let rows =
                TrendHistoryRow::search_for_user(&pool, user_id, pattern_ref, limit, offset).await?;
            Ok::<_, sqlx::Error>((rows, total))
        })
        .await
        .map_err(|e| ApiError::database("Failed to search trend history", e))?;

    let trends: Vec<TrendHistoryItem> = rows.into_iter().map(TrendHistoryItem::from).collect();
    let message = format!("Found {} trends matching your search", trends.len());
    let body = TrendPage {
        search: Some(SearchInfo {
            query: term,
            results_count: trends.len(),
            total_matches: total,
        }),
        trends,
        pagination: page.describe(total),
    };
    Ok(success("Search Results", message, json!(body)))
}

#[instrument(skip_all, fields(user_id = %claims.user_id))]
pub async fn delete_history(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(raw_id): Path<String>,
) -> Result<Json<Envelope<Value>>, ApiError> {
    let id = parse_trend_id(&raw_id)?;
    let user_id = claims.user_id;
    let deleted = state
        .db
        .run(|pool| async move { TrendHistoryRow::delete_for_user(&pool, id, user_id).await })
        .await
        .map_err(|e| ApiError::database("Failed to delete trend", e))?;
    if !deleted {
        return Err(trend_not_found());
    }

    info!(trend_id = %id, "trend deleted");
    Ok(done(
        "Trend Deleted",
        "Successfully deleted trend from your history",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::references::ArticleReference;

    fn request() -> SaveTrendRequest {
        SaveTrendRequest {
            search_term: Some("  AI\tchips ".into()),
            headline: Some("H\u{0}".into()),
            summary: Some("S".into()),
            key_points: Some(vec!["a".into(), "  ".into()]),
            call_to_action: Some("C".into()),
            article_references: Some(vec![
                ArticleReference {
                    title: "ok".into(),
                    url: "https://apnews.com/x".into(),
                    source: "AP".into(),
                    date: String::new(),
                },
                ArticleReference {
                    title: "bad".into(),
                    url: "https://evil.example.com/x".into(),
                    source: "?".into(),
                    date: String::new(),
                },
            ]),
        }
    }

    #[test]
    fn save_request_is_cleaned_and_filtered() {
        let (term, summary) = summary_from_request(request()).unwrap();
        assert_eq!(term, "AI chips");
        assert_eq!(summary.headline, "H");
        assert_eq!(summary.key_points, ["a"]);
        assert_eq!(summary.references.len(), 1);
        assert_eq!(summary.references[0].title, "ok");
    }

    #[test]
    fn save_request_requires_every_field() {
        let mut r = request();
        r.call_to_action = Some("   ".into());
        assert!(summary_from_request(r).is_err());

        let mut r = request();
        r.key_points = Some(vec![]);
        assert!(summary_from_request(r).is_err());

        let mut r = request();
        r.search_term = Some("x".repeat(SEARCH_TERM_MAX + 1));
        assert!(summary_from_request(r).is_err());
    }

    #[test]
    fn trend_ids_must_be_uuids() {
        assert!(parse_trend_id("nope").is_err());
        assert!(parse_trend_id(&Uuid::new_v4().to_string()).is_ok());
    }
}
