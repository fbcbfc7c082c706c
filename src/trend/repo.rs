use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::ai::validate::HotTopicDraft;

#[derive(Debug, Clone, FromRow)]
pub struct HotTopicRow {
    pub icon: String,
    pub title: String,
    pub description: String,
    pub query: String,
    pub batch_id: Uuid,
    pub created_at: OffsetDateTime,
}

/// Topics of the most recently created batch, in generation order.
pub async fn latest_batch(db: &PgPool) -> sqlx::Result<Vec<HotTopicRow>> {
    sqlx::query_as::<_, HotTopicRow>(
        r#"
        SELECT icon, title, description, query, batch_id, created_at
        FROM hot_topics
        WHERE batch_id = (
            SELECT batch_id FROM hot_topics ORDER BY created_at DESC LIMIT 1
        )
        ORDER BY position ASC
        "#,
    )
    .fetch_all(db)
    .await
}

/// Inserts the whole batch in one transaction; a failure leaves no partial batch.
pub async fn insert_batch(
    db: &PgPool,
    batch_id: Uuid,
    topics: &[HotTopicDraft],
    created_at: OffsetDateTime,
) -> sqlx::Result<()> {
    let mut tx = db.begin().await?;
    for (position, topic) in topics.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO hot_topics
                (id, icon, title, description, query, batch_id, position, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(topic.icon.as_str())
        .bind(&topic.title)
        .bind(&topic.description)
        .bind(&topic.query)
        .bind(batch_id)
        .bind(position as i16)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await
}

pub async fn purge_older_than(db: &PgPool, cutoff: OffsetDateTime) -> sqlx::Result<u64> {
    let res = sqlx::query("DELETE FROM hot_topics WHERE created_at < $1")
        .bind(cutoff)
        .execute(db)
        .await?;
    Ok(res.rows_affected())
}
