use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use super::repo::TrendHistoryRow;
use crate::ai::references::ArticleReference;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct SaveTrendRequest {
    pub search_term: Option<String>,
    pub headline: Option<String>,
    pub summary: Option<String>,
    pub key_points: Option<Vec<String>>,
    pub call_to_action: Option<String>,
    #[serde(alias = "references")]
    pub article_references: Option<Vec<ArticleReference>>,
}

/// Raw query; numbers stay strings so junk falls back to defaults.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub id: Option<String>,
    pub q: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn from_query(page: Option<&str>, limit: Option<&str>) -> Self {
        let parse = |raw: Option<&str>| raw.and_then(|v| v.trim().parse::<i64>().ok());
        Self {
            page: parse(page).unwrap_or(1).max(1),
            limit: parse(limit)
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn describe(&self, total_items: i64) -> Pagination {
        let total_pages = (total_items + self.limit - 1) / self.limit;
        Pagination {
            current_page: self.page,
            total_pages,
            total_items,
            items_per_page: self.limit,
            has_next: self.page < total_pages,
            has_prev: self.page > 1,
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_items: i64,
    pub items_per_page: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Serialize)]
pub struct SearchInfo {
    pub query: String,
    pub results_count: usize,
    pub total_matches: i64,
}

#[derive(Debug, Serialize)]
pub struct TrendPage {
    pub trends: Vec<TrendHistoryItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchInfo>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct SavedTrend {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub saved_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct TrendHistoryItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub search_term: String,
    pub headline: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub call_to_action: String,
    pub article_references: Vec<ArticleReference>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Stored JSON that no longer parses is served as an empty list.
fn parse_list<T: serde::de::DeserializeOwned>(raw: Option<&str>, id: Uuid, column: &str) -> Vec<T> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Vec::new();
    };
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!(%id, column, error = %e, "unreadable json column");
        Vec::new()
    })
}

impl From<TrendHistoryRow> for TrendHistoryItem {
    fn from(row: TrendHistoryRow) -> Self {
        let key_points = parse_list(Some(&row.key_points), row.id, "key_points");
        let article_references =
            parse_list(row.article_references.as_deref(), row.id, "article_references");
        Self {
            id: row.id,
            user_id: row.user_id,
            search_term: row.search_term,
            headline: row.headline,
            summary: row.summary,
            key_points,
            call_to_action: row.call_to_action,
            article_references,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
