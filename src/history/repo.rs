use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Stored history row; list columns hold JSON text.
#[derive(Debug, Clone, FromRow)]
pub struct TrendHistoryRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub search_term: String,
    pub headline: String,
    pub summary: String,
    pub key_points: String,
    pub call_to_action: String,
    pub article_references: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug)]
pub struct NewHistoryItem<'a> {
    pub user_id: Uuid,
    pub search_term: &'a str,
    pub headline: &'a str,
    pub summary: &'a str,
    pub key_points_json: &'a str,
    pub call_to_action: &'a str,
    pub references_json: Option<&'a str>,
}

const HISTORY_COLUMNS: &str = "id, user_id, search_term, headline, summary, key_points, \
                               call_to_action, article_references, created_at, updated_at";

const SEARCH_FILTER: &str = "user_id = $1 AND (search_term ILIKE $2 ESCAPE '\\' \
                             OR headline ILIKE $2 ESCAPE '\\' \
                             OR summary ILIKE $2 ESCAPE '\\')";

impl TrendHistoryRow {
    pub async fn insert(db: &PgPool, item: &NewHistoryItem<'_>) -> sqlx::Result<TrendHistoryRow> {
        sqlx::query_as::<_, TrendHistoryRow>(&format!(
            r#"
            INSERT INTO trend_history
                (id, user_id, search_term, headline, summary, key_points, call_to_action, article_references)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {HISTORY_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(item.user_id)
        .bind(item.search_term)
        .bind(item.headline)
        .bind(item.summary)
        .bind(item.key_points_json)
        .bind(item.call_to_action)
        .bind(item.references_json)
        .fetch_one(db)
        .await
    }

    /// Only returns the row if it belongs to `user_id`.
    pub async fn find_for_user(db: &PgPool, id: Uuid, user_id: Uuid) -> sqlx::Result<Option<TrendHistoryRow>> {
        sqlx::query_as::<_, TrendHistoryRow>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM trend_history WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await
    }

    pub async fn list_for_user(
        db: &PgPool,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> sqlx::Result<Vec<TrendHistoryRow>> {
        sqlx::query_as::<_, TrendHistoryRow>(&format!(
            r#"
            SELECT {HISTORY_COLUMNS} FROM trend_history
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
    }

    pub async fn count_for_user(db: &PgPool, user_id: Uuid) -> sqlx::Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM trend_history WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(db)
            .await
    }

    /// `pattern` is a ready LIKE pattern with metacharacters already escaped.
    pub async fn search_for_user(
        db: &PgPool,
        user_id: Uuid,
        pattern: &str,
        limit: i64,
        offset: i64,
    ) -> sqlx::Result<Vec<TrendHistoryRow>> {
        sqlx::query_as::<_, TrendHistoryRow>(&format!(
            r#"
            SELECT {HISTORY_COLUMNS} FROM trend_history
            WHERE {SEARCH_FILTER}
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(user_id)
        .bind(pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
    }

    pub async fn count_search(db: &PgPool, user_id: Uuid, pattern: &str) -> sqlx::Result<i64> {
        sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM trend_history WHERE {SEARCH_FILTER}"
        ))
        .bind(user_id)
        .bind(pattern)
        .fetch_one(db)
        .await
    }

    /// False when nothing matched, including rows owned by someone else.
    pub async fn delete_for_user(db: &PgPool, id: Uuid, user_id: Uuid) -> sqlx::Result<bool> {
        let res = sqlx::query("DELETE FROM trend_history WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[cfg(test)]
mod pg_tests {
    use super::*;
    use crate::auth::{repo::pg_tests::test_pool, repo_types::User};
    use crate::sanitize::escape_like;

    async fn user(db: &PgPool) -> Uuid {
        let email = format!("hist-{}@example.com", Uuid::new_v4().simple());
        User::create(db, &email, "hash", None).await.unwrap().id
    }

    fn item(user_id: Uuid, term: &str) -> NewHistoryItem<'_> {
        NewHistoryItem {
            user_id,
            search_term: term,
            headline: "headline",
            summary: "summary",
            key_points_json: r#"["a"]"#,
            call_to_action: "cta",
            references_json: None,
        }
    }

    #[tokio::test]
    #[ignore = "needs TEST_DATABASE_URL"]
    async fn rows_are_scoped_to_their_owner() {
        let pool = test_pool().await;
        let (alice, bob) = (user(&pool).await, user(&pool).await);
        let row = TrendHistoryRow::insert(&pool, &item(alice, "AI chips")).await.unwrap();

        assert!(TrendHistoryRow::find_for_user(&pool, row.id, bob).await.unwrap().is_none());
        assert!(!TrendHistoryRow::delete_for_user(&pool, row.id, bob).await.unwrap());
        assert!(TrendHistoryRow::delete_for_user(&pool, row.id, alice).await.unwrap());
        assert!(TrendHistoryRow::find_for_user(&pool, row.id, alice).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "needs TEST_DATABASE_URL"]
    async fn search_treats_wildcards_literally() {
        let pool = test_pool().await;
        let owner = user(&pool).await;
        TrendHistoryRow::insert(&pool, &item(owner, "100% renewable")).await.unwrap();
        TrendHistoryRow::insert(&pool, &item(owner, "1000 renewable")).await.unwrap();

        let pattern = format!("%{}%", escape_like("100%"));
        assert_eq!(TrendHistoryRow::count_search(&pool, owner, &pattern).await.unwrap(), 1);
        assert_eq!(TrendHistoryRow::count_for_user(&pool, owner).await.unwrap(), 2);
        let page = TrendHistoryRow::list_for_user(&pool, owner, 1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
    }
}
