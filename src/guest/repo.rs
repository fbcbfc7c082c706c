use sqlx::PgPool;
use uuid::Uuid;

/// Admits one guest request for `ip_hash` if the stored count is below `max`.
/// Insert-or-increment and the ceiling check are one statement, so concurrent
/// requests can never push the count past `max`. Returns the new count, or `None`
/// when the quota is exhausted.
pub async fn admit(db: &PgPool, ip_hash: &str, max: i32) -> sqlx::Result<Option<i32>> {
    if max < 1 {
        return Ok(None);
    }
    sqlx::query_scalar::<_, i32>(
        r#"
        INSERT INTO guest_requests (id, ip_address, request_count)
        VALUES ($1, $2, 1)
        ON CONFLICT (ip_address) DO UPDATE
            SET request_count = guest_requests.request_count + 1,
                updated_at = now()
            WHERE guest_requests.request_count < $3
        RETURNING request_count
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(ip_hash)
    .bind(max)
    .fetch_optional(db)
    .await
}

#[cfg(test)]
pub(crate) async fn request_count(db: &PgPool, ip_hash: &str) -> sqlx::Result<Option<i32>> {
    sqlx::query_scalar::<_, i32>("SELECT request_count FROM guest_requests WHERE ip_address = $1")
        .bind(ip_hash)
        .fetch_optional(db)
        .await
}
