use serde_json::json;
use uuid::Uuid;

use super::repo::{NewHistoryItem, TrendHistoryRow};
use crate::{
    ai::validate::TrendSummary,
    db::{Database, DbError},
};

/// Writes a validated summary to `user_id`'s history.
pub async fn save_summary(
    db: &Database,
    user_id: Uuid,
    search_term: &str,
    summary: &TrendSummary,
) -> Result<TrendHistoryRow, DbError> {
    let key_points_json = json!(summary.key_points).to_string();
    let references_json =
        (!summary.references.is_empty()).then(|| json!(summary.references).to_string());

    let item = NewHistoryItem {
        user_id,
        search_term,
        headline: &summary.headline,
        summary: &summary.summary,
        key_points_json: &key_points_json,
        call_to_action: &summary.call_to_action,
        references_json: references_json.as_deref(),
    };
    let item = &item;
    db.run(|pool| async move { TrendHistoryRow::insert(&pool, item).await })
        .await
}
